//! Pulse timeline
//!
//! Projection of the current solver solution onto a dispatchable sequence:
//! for every pulse, the atoms starting and ending there. Rebuilt from
//! scratch on every solution and after every absorbed delay; cleared when
//! the problem becomes inconsistent.

use std::collections::{BTreeMap, BTreeSet};

use cadence_core::solver::{expr, AtomId, AtomKind, PredicateId, SolverOps, Truth, TypeId};
use cadence_core::time::{InfRational, Rational};

/// Which pulse sides have already fired, per atom. Kept for the process
/// lifetime so a rebuild never re-schedules something the world already saw
/// happen.
#[derive(Debug, Default)]
pub struct DispatchRecord {
    pub starts: BTreeSet<AtomId>,
    pub ends: BTreeSet<AtomId>,
}

/// Sorted pulse index over the current solution.
#[derive(Debug, Default)]
pub struct PulseTimeline {
    starts: BTreeMap<InfRational, BTreeSet<AtomId>>,
    ends: BTreeMap<InfRational, BTreeSet<AtomId>>,
    pulses: BTreeSet<InfRational>,
}

impl PulseTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// The earliest pulse still on the timeline.
    pub fn first_pulse(&self) -> Option<InfRational> {
        self.pulses.iter().next().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.pulses.is_empty()
    }

    /// All pulses, in order.
    pub fn pulses(&self) -> impl Iterator<Item = &InfRational> {
        self.pulses.iter()
    }

    /// Atoms starting at a pulse.
    pub fn starting_at(&self, pulse: &InfRational) -> Option<&BTreeSet<AtomId>> {
        self.starts.get(pulse)
    }

    /// Atoms ending at a pulse.
    pub fn ending_at(&self, pulse: &InfRational) -> Option<&BTreeSet<AtomId>> {
        self.ends.get(pulse)
    }

    /// Drop a fully dispatched pulse.
    pub fn remove_pulse(&mut self, pulse: &InfRational) {
        self.starts.remove(pulse);
        self.ends.remove(pulse);
        self.pulses.remove(pulse);
    }

    pub fn clear(&mut self) {
        self.starts.clear();
        self.ends.clear();
        self.pulses.clear();
    }

    /// Rebuild from the solver's current solution.
    ///
    /// Only active atoms of the relevant predicates contribute. Atoms wholly
    /// in the past are skipped, as is any pulse side already dispatched: an
    /// interval underway contributes only its end pulse.
    pub fn rebuild(
        &mut self,
        slv: &dyn SolverOps,
        relevant: &BTreeSet<PredicateId>,
        now: &Rational,
        dispatched: &DispatchRecord,
    ) {
        tracing::debug!(time = %now, "rebuilding timelines");
        self.clear();
        let now = InfRational::from(*now);

        for pred in relevant {
            for atom in slv.predicate_instances(*pred) {
                if slv.lit_value(slv.atom_sigma(atom)) != Truth::True {
                    continue;
                }
                match slv.atom_kind(atom) {
                    Some(AtomKind::Impulse) => {
                        let Some(at) = slv.atom_expr(atom, expr::AT) else {
                            continue;
                        };
                        let at = slv.arith_value(at);
                        if at < now {
                            continue;
                        }
                        if !dispatched.starts.contains(&atom) {
                            self.starts.entry(at).or_default().insert(atom);
                            self.pulses.insert(at);
                        }
                        if !dispatched.ends.contains(&atom) {
                            self.ends.entry(at).or_default().insert(atom);
                            self.pulses.insert(at);
                        }
                    }
                    Some(AtomKind::Interval) => {
                        let (Some(start), Some(end)) = (
                            slv.atom_expr(atom, expr::START),
                            slv.atom_expr(atom, expr::END),
                        ) else {
                            continue;
                        };
                        if dispatched.ends.contains(&atom) {
                            continue;
                        }
                        let end = slv.arith_value(end);
                        if end < now {
                            continue;
                        }
                        let start = slv.arith_value(start);
                        if start >= now && !dispatched.starts.contains(&atom) {
                            self.starts.entry(start).or_default().insert(atom);
                            self.pulses.insert(start);
                        }
                        self.ends.entry(end).or_default().insert(atom);
                        self.pulses.insert(end);
                    }
                    None => {}
                }
            }
        }
    }
}

/// Collect the predicates whose atoms belong on the timeline: every impulse
/// or interval predicate of the top-level scope and, transitively, of every
/// complex type.
pub fn relevant_predicates(slv: &dyn SolverOps) -> BTreeSet<PredicateId> {
    let mut relevant = BTreeSet::new();
    for pred in slv.predicates() {
        if slv.predicate_kind(pred).is_some() {
            relevant.insert(pred);
        }
    }

    let mut queue: Vec<TypeId> = slv.types();
    let mut visited: BTreeSet<TypeId> = queue.iter().copied().collect();
    while let Some(ty) = queue.pop() {
        for pred in slv.type_predicates(ty) {
            if slv.predicate_kind(pred).is_some() {
                relevant.insert(pred);
            }
        }
        for member in slv.type_members(ty) {
            if visited.insert(member) {
                queue.push(member);
            }
        }
    }
    relevant
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::error::ExecutionError;
    use cadence_core::solver::{Lit, Propagation, Solver, SolverObserver, Theory};
    use cadence_core::time::Rational;
    use cadence_sim::SimSolver;

    struct Noop;

    impl Theory for Noop {
        fn on_propagate(&mut self, _ops: &mut dyn SolverOps, _p: Lit) -> Propagation {
            Propagation::Consistent
        }
    }

    impl SolverObserver for Noop {
        fn on_solution_found(&mut self, _slv: &mut dyn Solver) -> Result<(), ExecutionError> {
            Ok(())
        }
    }

    fn r(n: i64) -> Rational {
        Rational::from_integer(n)
    }

    #[test]
    fn test_relevant_predicates_cover_nested_types() {
        let mut slv = SimSolver::new();
        let top = slv.add_predicate("ping", AtomKind::Impulse);
        let rover = slv.add_type("rover");
        let arm = slv.add_member_type(rover, "arm");
        let drive = slv.add_type_predicate(rover, "drive", AtomKind::Interval);
        let grip = slv.add_type_predicate(arm, "grip", AtomKind::Interval);

        let relevant = relevant_predicates(&slv);
        assert!(relevant.contains(&top));
        assert!(relevant.contains(&drive));
        assert!(relevant.contains(&grip));
    }

    #[test]
    fn test_rebuild_trims_the_past_and_dispatched_sides() {
        let mut slv = SimSolver::new();
        let _gone = slv.add_impulse("gone", r(1));
        let soon = slv.add_impulse("soon", r(4));
        let underway = slv.add_interval("underway", r(3), r(6));
        let mut noop = Noop;
        assert!(slv.solve(&mut noop).unwrap());

        let relevant = relevant_predicates(&slv);
        let mut dispatched = DispatchRecord::default();
        dispatched.starts.insert(underway);

        let mut timeline = PulseTimeline::new();
        timeline.rebuild(&slv, &relevant, &r(3), &dispatched);

        // `gone` is in the past; `underway` started, so only its end remains
        let pulses: Vec<InfRational> = timeline.pulses().copied().collect();
        assert_eq!(pulses, vec![InfRational::from(4), InfRational::from(6)]);
        assert!(timeline
            .starting_at(&InfRational::from(4))
            .is_some_and(|atoms| atoms.contains(&soon)));
        assert!(timeline.starting_at(&InfRational::from(3)).is_none());
        assert!(timeline
            .ending_at(&InfRational::from(6))
            .is_some_and(|atoms| atoms.contains(&underway)));
    }
}
