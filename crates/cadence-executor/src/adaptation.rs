//! Atom adaptation store
//!
//! The canonical record of what the executor has told the solver about each
//! atom: delays pushed onto its bounds and values frozen at dispatch. Every
//! record is gated by the atom's private guard literal, so the solver can
//! retract the whole batch by retracting the guard; the store itself never
//! forgets anything.

use std::collections::HashMap;

use cadence_core::solver::{AtomId, ExprId, Lit, Truth, ValueRef, Var};
use cadence_core::time::InfRational;

/// A bound the executor has committed to for one expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bound {
    /// The expression's backing literal must keep this value.
    Bool(Truth),
    /// The expression must stay within `[lb, ub]`.
    Arith { lb: InfRational, ub: InfRational },
    /// The ordered-values variable must keep this value.
    Enum(ValueRef),
}

/// Everything the executor has imposed on one atom.
#[derive(Debug)]
pub struct AtomAdaptation {
    /// Guard literal gating this atom's bounds; allocated by the executor
    /// and bound to its theory.
    pub sigma_xi: Lit,
    bounds: HashMap<ExprId, Bound>,
}

impl AtomAdaptation {
    fn new(sigma_xi: Lit) -> Self {
        Self {
            sigma_xi,
            bounds: HashMap::new(),
        }
    }

    /// Iterate the recorded bounds.
    pub fn bounds(&self) -> impl Iterator<Item = (&ExprId, &Bound)> {
        self.bounds.iter()
    }

    pub fn bound(&self, expr: ExprId) -> Option<&Bound> {
        self.bounds.get(&expr)
    }
}

/// Store of adaptations, indexed by atom and by guard variable.
///
/// Stored bounds only ever tighten: a lower bound never decreases, a freeze
/// replaces an interval with a point inside it. Conflicts arising from a
/// tightening are the solver's to resolve, not the store's.
#[derive(Debug, Default)]
pub struct AdaptationStore {
    by_atom: HashMap<AtomId, AtomAdaptation>,
    by_var: HashMap<Var, AtomId>,
}

impl AdaptationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an atom under a fresh guard literal. At most one adaptation
    /// exists per atom; a second registration is ignored.
    pub fn insert(&mut self, atom: AtomId, sigma_xi: Lit) {
        self.by_atom
            .entry(atom)
            .or_insert_with(|| AtomAdaptation::new(sigma_xi));
        self.by_var.entry(sigma_xi.var()).or_insert(atom);
    }

    pub fn contains(&self, atom: AtomId) -> bool {
        self.by_atom.contains_key(&atom)
    }

    pub fn get(&self, atom: AtomId) -> Option<&AtomAdaptation> {
        self.by_atom.get(&atom)
    }

    /// The atom whose guard ranges over the given variable.
    pub fn atom_for_var(&self, var: Var) -> Option<AtomId> {
        self.by_var.get(&var).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AtomId, &AtomAdaptation)> {
        self.by_atom.iter()
    }

    /// Raise the lower bound of an arithmetic expression, installing
    /// `[lb, current_ub]` if nothing was recorded yet. The stored lower
    /// bound never decreases.
    pub fn raise_arith_lb(&mut self, atom: AtomId, expr: ExprId, lb: InfRational, ub: InfRational) {
        let Some(adaptation) = self.by_atom.get_mut(&atom) else {
            return;
        };
        match adaptation.bounds.get_mut(&expr) {
            Some(Bound::Arith { lb: stored, .. }) => {
                if lb > *stored {
                    *stored = lb;
                }
            }
            _ => {
                adaptation.bounds.insert(expr, Bound::Arith { lb, ub });
            }
        }
    }

    /// Pin an arithmetic expression to its dispatched value.
    pub fn freeze_arith(&mut self, atom: AtomId, expr: ExprId, value: InfRational) {
        if let Some(adaptation) = self.by_atom.get_mut(&atom) {
            adaptation
                .bounds
                .insert(expr, Bound::Arith { lb: value, ub: value });
        }
    }

    /// Pin a propositional expression to its dispatched value.
    pub fn freeze_bool(&mut self, atom: AtomId, expr: ExprId, value: Truth) {
        if let Some(adaptation) = self.by_atom.get_mut(&atom) {
            adaptation.bounds.insert(expr, Bound::Bool(value));
        }
    }

    /// Pin an ordered-values expression to its dispatched value.
    pub fn freeze_enum(&mut self, atom: AtomId, expr: ExprId, value: ValueRef) {
        if let Some(adaptation) = self.by_atom.get_mut(&atom) {
            adaptation.bounds.insert(expr, Bound::Enum(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::time::Rational;

    fn at(n: i64) -> InfRational {
        InfRational::from(Rational::from_integer(n))
    }

    #[test]
    fn test_insert_is_idempotent_per_atom() {
        let mut store = AdaptationStore::new();
        let first = Lit::positive(3);
        store.insert(AtomId(1), first);
        store.insert(AtomId(1), Lit::positive(9));

        assert_eq!(store.get(AtomId(1)).unwrap().sigma_xi, first);
        assert_eq!(store.atom_for_var(3), Some(AtomId(1)));
        assert_eq!(store.atom_for_var(9), None);
    }

    #[test]
    fn test_raise_arith_lb_installs_then_tightens() {
        let mut store = AdaptationStore::new();
        store.insert(AtomId(1), Lit::positive(0));

        store.raise_arith_lb(AtomId(1), ExprId(7), at(2), InfRational::PosInf);
        store.raise_arith_lb(AtomId(1), ExprId(7), at(5), InfRational::PosInf);
        // a later, weaker request must not loosen the bound
        store.raise_arith_lb(AtomId(1), ExprId(7), at(4), InfRational::PosInf);

        assert_eq!(
            store.get(AtomId(1)).unwrap().bound(ExprId(7)),
            Some(&Bound::Arith {
                lb: at(5),
                ub: InfRational::PosInf
            })
        );
    }

    #[test]
    fn test_freeze_replaces_interval_with_point() {
        let mut store = AdaptationStore::new();
        store.insert(AtomId(2), Lit::positive(1));
        store.raise_arith_lb(AtomId(2), ExprId(4), at(1), InfRational::PosInf);
        store.freeze_arith(AtomId(2), ExprId(4), at(3));

        assert_eq!(
            store.get(AtomId(2)).unwrap().bound(ExprId(4)),
            Some(&Bound::Arith { lb: at(3), ub: at(3) })
        );
    }

    #[test]
    fn test_freezes_for_missing_atom_are_ignored() {
        let mut store = AdaptationStore::new();
        store.freeze_bool(AtomId(9), ExprId(1), Truth::True);
        assert!(store.get(AtomId(9)).is_none());
    }
}
