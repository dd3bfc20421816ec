//! The dispatcher: tick processing and the execution state machine.
//!
//! `Executor` owns the solver and the `Engine`. The engine is the plugin
//! half: it is handed to every solver control call, so solver callbacks
//! (propagation, solution found, flaw created) land back on it while the
//! solver remains a black box that holds no reference to the executor.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cadence_core::error::ExecutionError;
use cadence_core::listener::{DelayRequests, ExecutorListener};
use cadence_core::solver::{expr, AtomId, AtomKind, ExprShape, Lit, PredicateId, Solver, SolverOps};
use cadence_core::state::ExecutorState;
use cadence_core::time::{InfRational, Rational};

use crate::adaptation::AdaptationStore;
use crate::config::ExecutorConfig;
use crate::timeline::{relevant_predicates, DispatchRecord, PulseTimeline};

/// Bound on the delay-absorb/re-solve cycle within one tick. Each re-solve
/// either advances the solver to a new solution or fails; past this many the
/// tick gives up.
const MAX_RESOLVES_PER_TICK: usize = 32;

/// Which side of an atom a delay applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Start,
    End,
}

/// The plugin half of the executor: state machine, stores, and listeners.
///
/// Mutated only through `Executor`, which serializes every entry point on
/// `&mut self`; the `running` flag is atomic so observers can read it
/// without synchronizing.
pub(crate) struct Engine {
    name: String,
    units_per_tick: Rational,
    state: ExecutorState,
    running: Arc<AtomicBool>,
    current_time: Rational,
    pub(crate) xi: Lit,
    pub(crate) adaptations: AdaptationStore,
    pub(crate) relevant: BTreeSet<PredicateId>,
    timeline: PulseTimeline,
    dispatched: DispatchRecord,
    executing: BTreeSet<AtomId>,
    dont_start: HashMap<AtomId, Rational>,
    dont_end: HashMap<AtomId, Rational>,
    pending_requirements: bool,
    listeners: Vec<Box<dyn ExecutorListener>>,
}

impl Engine {
    fn new(slv: &mut dyn Solver, config: ExecutorConfig) -> Self {
        let name = config
            .name
            .unwrap_or_else(|| format!("executor-{}", uuid::Uuid::new_v4()));
        let xi_var = slv.new_sat_var();
        slv.bind(xi_var);
        Self {
            name,
            units_per_tick: config.units_per_tick,
            state: ExecutorState::Reasoning,
            running: Arc::new(AtomicBool::new(false)),
            current_time: Rational::from_integer(0),
            xi: Lit::positive(xi_var),
            adaptations: AdaptationStore::new(),
            relevant: relevant_predicates(&*slv),
            timeline: PulseTimeline::new(),
            dispatched: DispatchRecord::default(),
            executing: BTreeSet::new(),
            dont_start: HashMap::new(),
            dont_end: HashMap::new(),
            pending_requirements: false,
            listeners: Vec::new(),
        }
    }

    pub(crate) fn state(&self) -> ExecutorState {
        self.state
    }

    pub(crate) fn current_time(&self) -> Rational {
        self.current_time
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub(crate) fn set_state(&mut self, state: ExecutorState) {
        if self.state == state {
            return;
        }
        self.state = state;
        tracing::debug!(executor = %self.name, state = %state, "executor state changed");
        for listener in &mut self.listeners {
            listener.state_changed(state);
        }
    }

    pub(crate) fn fail_state(&mut self) {
        self.set_state(ExecutorState::Failed);
    }

    pub(crate) fn rebuild_timeline(&mut self, slv: &dyn Solver) {
        self.timeline
            .rebuild(slv, &self.relevant, &self.current_time, &self.dispatched);
    }

    pub(crate) fn clear_timeline(&mut self) {
        self.timeline.clear();
    }

    pub(crate) fn retain_active_executing(&mut self, slv: &dyn Solver) {
        self.executing
            .retain(|atom| slv.lit_value(slv.atom_sigma(*atom)) == cadence_core::Truth::True);
    }

    fn start_execution(&mut self) {
        self.running.store(true, Ordering::Release);
        self.set_state(ExecutorState::Executing);
    }

    fn pause_execution(&mut self) {
        self.running.store(false, Ordering::Release);
        self.set_state(ExecutorState::Idle);
    }

    fn absorb_requests(&mut self, requests: DelayRequests) {
        let (starts, ends) = requests.into_parts();
        for (atom, delay) in starts {
            self.dont_start.entry(atom).or_insert(delay);
        }
        for (atom, delay) in ends {
            self.dont_end.entry(atom).or_insert(delay);
        }
    }

    /// One tick: absorb pending requirements, advance the clock into the
    /// new window, drain every pulse inside it, then check the horizon.
    fn tick(&mut self, slv: &mut dyn Solver) -> Result<(), ExecutionError> {
        if self.pending_requirements {
            self.pending_requirements = false;
            match slv.solve(&mut *self) {
                Ok(true) => {}
                Ok(false) => {
                    self.fail_state();
                    return Err(ExecutionError::InconsistentProblem);
                }
                Err(err) => {
                    self.fail_state();
                    return Err(err);
                }
            }
        }

        if !self.is_running() {
            return Ok(());
        }

        self.current_time += self.units_per_tick;
        let window_end = InfRational::from(self.current_time);
        tracing::debug!(executor = %self.name, time = %self.current_time, "tick");

        let mut resolves = 0usize;
        while let Some(pulse) = self.timeline.first_pulse() {
            if pulse > window_end {
                break;
            }
            let starting = self
                .timeline
                .starting_at(&pulse)
                .cloned()
                .unwrap_or_default();
            let ending = self.timeline.ending_at(&pulse).cloned().unwrap_or_default();

            // listeners may veto with a delay request
            let mut requests = DelayRequests::new();
            if !starting.is_empty() {
                for listener in &mut self.listeners {
                    listener.starting(&starting, &mut requests);
                }
            }
            if !ending.is_empty() {
                for listener in &mut self.listeners {
                    listener.ending(&ending, &mut requests);
                }
            }
            self.absorb_requests(requests);

            let mut delayed = false;
            for atom in &starting {
                if self.dont_start.contains_key(atom) {
                    self.postpone(slv, *atom, Side::Start)?;
                    delayed = true;
                }
            }
            for atom in &ending {
                if self.dont_end.contains_key(atom) {
                    self.postpone(slv, *atom, Side::End)?;
                    delayed = true;
                }
            }
            if delayed {
                resolves += 1;
                if resolves > MAX_RESOLVES_PER_TICK {
                    self.fail_state();
                    return Err(ExecutionError::ExhaustedResolve(MAX_RESOLVES_PER_TICK));
                }
                if !slv.propagate(&mut *self) {
                    self.fail_state();
                    return Err(ExecutionError::UnsatisfiableUnderExecution);
                }
                match slv.solve(&mut *self) {
                    Ok(true) => {}
                    Ok(false) => {
                        self.fail_state();
                        return Err(ExecutionError::UnsatisfiableUnderExecution);
                    }
                    Err(err) => {
                        self.fail_state();
                        return Err(err);
                    }
                }
                // the timeline changed under us; restart the drain
                continue;
            }

            if !starting.is_empty() {
                for atom in &starting {
                    self.freeze_start(slv, *atom)?;
                }
                self.executing.extend(starting.iter().copied());
                self.dispatched.starts.extend(starting.iter().copied());
                for listener in &mut self.listeners {
                    listener.start(&starting);
                }
            }
            if !ending.is_empty() {
                for atom in &ending {
                    self.freeze_end(slv, *atom)?;
                }
                for atom in &ending {
                    self.executing.remove(atom);
                }
                self.dispatched.ends.extend(ending.iter().copied());
                for listener in &mut self.listeners {
                    listener.end(&ending);
                }
            }

            self.timeline.remove_pulse(&pulse);
        }

        self.finished_check(&*slv);

        let time = self.current_time;
        for listener in &mut self.listeners {
            listener.tick(&time);
        }
        Ok(())
    }

    /// Push an atom's dispatch point forward by at least one tick, through
    /// the adaptation store and directly onto the linear theory.
    fn postpone(
        &mut self,
        slv: &mut dyn Solver,
        atom: AtomId,
        side: Side,
    ) -> Result<(), ExecutionError> {
        let delay = match side {
            Side::Start => self.dont_start.remove(&atom),
            Side::End => self.dont_end.remove(&atom),
        };
        let Some(delay) = delay else {
            return Ok(());
        };

        let name = match (slv.atom_kind(atom), side) {
            (Some(AtomKind::Impulse), _) => expr::AT,
            (Some(AtomKind::Interval), Side::Start) => expr::START,
            (Some(AtomKind::Interval), Side::End) => expr::END,
            (None, _) => {
                self.fail_state();
                return Err(ExecutionError::UnknownAtom(atom));
            }
        };
        let Some(xpr) = slv.atom_expr(atom, name) else {
            self.fail_state();
            return Err(ExecutionError::MissingExpression { atom, name });
        };
        if slv.is_constant(xpr) {
            self.fail_state();
            return Err(ExecutionError::ConstantDelayRequested);
        }
        let Some(sigma_xi) = self.adaptations.get(atom).map(|a| a.sigma_xi) else {
            self.fail_state();
            return Err(ExecutionError::UnknownAtom(atom));
        };

        let step = if self.units_per_tick > delay {
            self.units_per_tick
        } else {
            delay
        };
        let lb = slv.arith_value(xpr) + step;
        let (_, ub) = slv.arith_bounds(xpr);
        self.adaptations.raise_arith_lb(atom, xpr, lb, ub);

        match slv.expr_shape(xpr) {
            ExprShape::Arith { real: true } => {
                let var = slv.lin_var(xpr);
                if !slv.lin_set_lb(var, lb, sigma_xi) {
                    let conflict = slv.take_theory_conflict();
                    if !slv.analyze_and_backjump(&conflict, &mut *self) {
                        self.fail_state();
                        return Err(ExecutionError::TheoryConflict);
                    }
                }
            }
            _ => {
                self.fail_state();
                return Err(ExecutionError::UnsupportedDomain);
            }
        }
        tracing::debug!(executor = %self.name, atom = %atom, lb = %lb, "postponed atom");
        Ok(())
    }

    /// Freeze the values an atom starts with, so the solver keeps them
    /// through any later backtrack.
    fn freeze_start(&mut self, slv: &mut dyn Solver, atom: AtomId) -> Result<(), ExecutionError> {
        let Some(sigma_xi) = self.adaptations.get(atom).map(|a| a.sigma_xi) else {
            self.fail_state();
            return Err(ExecutionError::UnknownAtom(atom));
        };
        for (name, xpr) in slv.atom_exprs(atom) {
            if matches!(name.as_str(), expr::AT | expr::DURATION | expr::END) {
                continue;
            }
            match slv.expr_shape(xpr) {
                ExprShape::Bool { lit } => {
                    let value = slv.lit_value(lit);
                    debug_assert!(value.is_defined(), "dispatched boolean is unassigned");
                    self.adaptations.freeze_bool(atom, xpr, value);
                }
                ExprShape::Arith { real } => {
                    if slv.is_constant(xpr) {
                        continue;
                    }
                    if !real {
                        self.fail_state();
                        return Err(ExecutionError::UnsupportedDomain);
                    }
                    let var = slv.lin_var(xpr);
                    let value = slv.lin_value(var);
                    self.adaptations.freeze_arith(atom, xpr, value);
                    if !slv.lin_set(var, value, sigma_xi) {
                        let conflict = slv.take_theory_conflict();
                        if !slv.analyze_and_backjump(&conflict, &mut *self) {
                            self.fail_state();
                            return Err(ExecutionError::TheoryConflict);
                        }
                    }
                }
                ExprShape::Enum { var } => {
                    let values = slv.ov_value(var);
                    debug_assert_eq!(values.len(), 1, "dispatched enum is undecided");
                    if let Some(value) = values.first() {
                        self.adaptations.freeze_enum(atom, xpr, *value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Freeze the time point an atom ends at.
    fn freeze_end(&mut self, slv: &mut dyn Solver, atom: AtomId) -> Result<(), ExecutionError> {
        let name = match slv.atom_kind(atom) {
            Some(AtomKind::Impulse) => expr::AT,
            Some(AtomKind::Interval) => expr::END,
            None => return Ok(()),
        };
        let Some(xpr) = slv.atom_expr(atom, name) else {
            self.fail_state();
            return Err(ExecutionError::MissingExpression { atom, name });
        };
        if slv.is_constant(xpr) {
            return Ok(());
        }
        let Some(sigma_xi) = self.adaptations.get(atom).map(|a| a.sigma_xi) else {
            self.fail_state();
            return Err(ExecutionError::UnknownAtom(atom));
        };
        let value = slv.arith_value(xpr);
        self.adaptations.freeze_arith(atom, xpr, value);
        match slv.expr_shape(xpr) {
            ExprShape::Arith { real: true } => {
                let var = slv.lin_var(xpr);
                if !slv.lin_set(var, value, sigma_xi) {
                    let conflict = slv.take_theory_conflict();
                    if !slv.analyze_and_backjump(&conflict, &mut *self) {
                        self.fail_state();
                        return Err(ExecutionError::TheoryConflict);
                    }
                }
            }
            _ => {
                self.fail_state();
                return Err(ExecutionError::UnsupportedDomain);
            }
        }
        Ok(())
    }

    fn finished_check(&mut self, slv: &dyn Solver) {
        if self.state == ExecutorState::Failed {
            return;
        }
        let Some(horizon) = slv.horizon() else {
            return;
        };
        if slv.arith_value(horizon) <= InfRational::from(self.current_time)
            && self.dont_end.is_empty()
        {
            self.set_state(ExecutorState::Finished);
        }
    }

    fn adapt_script(&mut self, slv: &mut dyn Solver, script: &str) -> Result<(), ExecutionError> {
        while !slv.root_level() {
            slv.pop_level(&mut *self);
        }
        slv.read_script(script, &mut *self)?;
        self.pending_requirements = true;
        Ok(())
    }

    fn adapt_files(&mut self, slv: &mut dyn Solver, files: &[String]) -> Result<(), ExecutionError> {
        while !slv.root_level() {
            slv.pop_level(&mut *self);
        }
        slv.read_files(files, &mut *self)?;
        self.pending_requirements = true;
        Ok(())
    }

    /// These atoms did not go as planned: retract their activation and ask
    /// the solver for an alternative.
    fn failure(
        &mut self,
        slv: &mut dyn Solver,
        atoms: &BTreeSet<AtomId>,
    ) -> Result<(), ExecutionError> {
        let conflict: Vec<Lit> = atoms.iter().map(|atom| !slv.atom_sigma(*atom)).collect();
        tracing::debug!(executor = %self.name, atoms = atoms.len(), "execution failure reported");
        if !slv.analyze_and_backjump(&conflict, &mut *self) {
            self.fail_state();
            return Err(ExecutionError::UnsatisfiableUnderExecution);
        }
        match slv.solve(&mut *self) {
            Ok(true) => Ok(()),
            Ok(false) => {
                self.fail_state();
                Err(ExecutionError::UnsatisfiableUnderExecution)
            }
            Err(err) => {
                self.fail_state();
                Err(err)
            }
        }
    }
}

/// A plan executor: drives a solver-produced plan through real time.
pub struct Executor<S: Solver> {
    solver: S,
    engine: Engine,
}

impl<S: Solver> Executor<S> {
    /// Wrap a solver. The executor allocates and binds its execution guard
    /// immediately; the solver must not have an open decision level.
    pub fn new(mut solver: S, config: ExecutorConfig) -> Self {
        let engine = Engine::new(&mut solver, config);
        Self { solver, engine }
    }

    /// Register an observer. Listeners are notified serially, in
    /// registration order.
    pub fn add_listener(&mut self, listener: Box<dyn ExecutorListener>) {
        self.engine.listeners.push(listener);
    }

    /// Solve (or re-solve) the underlying problem.
    pub fn solve(&mut self) -> Result<bool, ExecutionError> {
        self.solver.solve(&mut self.engine)
    }

    /// Process one tick.
    pub fn tick(&mut self) -> Result<(), ExecutionError> {
        self.engine.tick(&mut self.solver)
    }

    /// Read new requirements from a planning script; they are solved at the
    /// next tick.
    pub fn adapt(&mut self, script: &str) -> Result<(), ExecutionError> {
        self.engine.adapt_script(&mut self.solver, script)
    }

    /// Read new requirements from script files.
    pub fn adapt_files(&mut self, files: &[String]) -> Result<(), ExecutionError> {
        self.engine.adapt_files(&mut self.solver, files)
    }

    /// Report atoms whose execution failed in the world.
    pub fn failure(&mut self, atoms: &BTreeSet<AtomId>) -> Result<(), ExecutionError> {
        self.engine.failure(&mut self.solver, atoms)
    }

    /// Hold back atoms that are about to start.
    pub fn dont_start_yet(&mut self, atoms: HashMap<AtomId, Rational>) {
        for (atom, delay) in atoms {
            self.engine.dont_start.entry(atom).or_insert(delay);
        }
    }

    /// Hold back atoms that are about to end.
    pub fn dont_end_yet(&mut self, atoms: HashMap<AtomId, Rational>) {
        for (atom, delay) in atoms {
            self.engine.dont_end.entry(atom).or_insert(delay);
        }
    }

    pub fn start_execution(&mut self) {
        self.engine.start_execution();
    }

    pub fn pause_execution(&mut self) {
        self.engine.pause_execution();
    }

    pub fn name(&self) -> &str {
        &self.engine.name
    }

    pub fn current_time(&self) -> Rational {
        self.engine.current_time
    }

    pub fn units_per_tick(&self) -> Rational {
        self.engine.units_per_tick
    }

    pub fn state(&self) -> ExecutorState {
        self.engine.state
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    /// Atoms whose start has been dispatched but whose end has not.
    pub fn executing(&self) -> &BTreeSet<AtomId> {
        &self.engine.executing
    }

    /// Remaining pulses, in order.
    pub fn pulses(&self) -> Vec<InfRational> {
        self.engine.timeline.pulses().copied().collect()
    }

    /// Shared handle to the `running` flag, readable without locking.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.engine.running)
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::solver::SolverOps;
    use cadence_core::Truth;
    use cadence_sim::SimSolver;

    use crate::adaptation::Bound;
    use crate::message::{ExecutorMessage, MessageLog};

    fn r(n: i64) -> Rational {
        Rational::from_integer(n)
    }

    fn inf(n: i64) -> InfRational {
        InfRational::from(n)
    }

    /// Build an executor over the solver, attach a message log, and solve
    /// the initial problem.
    fn ready(slv: SimSolver) -> (Executor<SimSolver>, MessageLog) {
        let mut exec = Executor::new(slv, ExecutorConfig::named("test"));
        let log = MessageLog::new();
        exec.add_listener(Box::new(log.clone()));
        assert!(exec.solve().unwrap());
        (exec, log)
    }

    /// Listener that vetoes the first `starting` of one atom with a delay.
    struct DelayStart {
        atom: AtomId,
        delay: Rational,
        fired: bool,
    }

    impl ExecutorListener for DelayStart {
        fn starting(&mut self, atoms: &BTreeSet<AtomId>, delays: &mut DelayRequests) {
            if !self.fired && atoms.contains(&self.atom) {
                delays.dont_start_yet(self.atom, self.delay);
                self.fired = true;
            }
        }
    }

    /// Every stored bound whose guard holds must agree with the solver.
    fn assert_bounds_hold(exec: &Executor<SimSolver>) {
        let slv = &exec.solver;
        for (atom, adaptation) in exec.engine.adaptations.iter() {
            if slv.lit_value(adaptation.sigma_xi) != Truth::True {
                continue;
            }
            for (xpr, bound) in adaptation.bounds() {
                match bound {
                    Bound::Arith { lb, ub } => {
                        let value = slv.arith_value(*xpr);
                        assert!(
                            *lb <= value && value <= *ub,
                            "atom {atom}: {value} outside [{lb}, {ub}]"
                        );
                    }
                    Bound::Bool(value) => {
                        let ExprShape::Bool { lit } = slv.expr_shape(*xpr) else {
                            panic!("bool bound on a non-bool expression");
                        };
                        assert_eq!(slv.lit_value(lit), *value, "atom {atom}: bool drifted");
                    }
                    Bound::Enum(value) => {
                        let ExprShape::Enum { var } = slv.expr_shape(*xpr) else {
                            panic!("enum bound on a non-enum expression");
                        };
                        assert_eq!(slv.ov_value(var), vec![*value], "atom {atom}: enum drifted");
                    }
                }
            }
        }
    }

    #[test]
    fn test_single_impulse_dispatches_on_its_pulse() {
        // S1: impulse at 3, one unit per tick
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(3));
        slv.set_horizon(r(10));
        let (mut exec, log) = ready(slv);
        let ping = exec.solver().atom_by_name("ping").unwrap();

        exec.start_execution();
        log.clear();
        exec.tick().unwrap();
        exec.tick().unwrap();
        assert_eq!(
            log.messages(),
            vec![
                ExecutorMessage::Tick { time: r(1) },
                ExecutorMessage::Tick { time: r(2) },
            ]
        );

        exec.tick().unwrap();
        assert_eq!(exec.current_time(), r(3));
        assert!(exec.pulses().is_empty());
        assert!(exec.executing().is_empty());
        assert_eq!(
            log.messages()[2..].to_vec(),
            vec![
                ExecutorMessage::Starting { atoms: vec![ping] },
                ExecutorMessage::Ending { atoms: vec![ping] },
                ExecutorMessage::Start { atoms: vec![ping] },
                ExecutorMessage::End { atoms: vec![ping] },
                ExecutorMessage::Tick { time: r(3) },
            ]
        );
    }

    #[test]
    fn test_listener_delay_pushes_start_and_keeps_end() {
        // S2: interval [2, 5], listener asks for 2 more units at `starting`
        let mut slv = SimSolver::new();
        slv.add_interval("survey", r(2), r(5));
        slv.set_horizon(r(10));
        let (mut exec, log) = ready(slv);
        let survey = exec.solver().atom_by_name("survey").unwrap();
        exec.add_listener(Box::new(DelayStart {
            atom: survey,
            delay: r(2),
            fired: false,
        }));

        exec.start_execution();
        exec.tick().unwrap();
        exec.tick().unwrap();
        // the veto moved the start to 2 + max(1, 2) = 4
        assert_eq!(exec.pulses(), vec![inf(4), inf(5)]);
        assert!(exec.executing().is_empty());
        assert_bounds_hold(&exec);

        exec.tick().unwrap();
        exec.tick().unwrap();
        assert!(exec.executing().contains(&survey));
        exec.tick().unwrap();
        assert!(exec.executing().is_empty());

        // exactly one dispatched start and one dispatched end overall
        let dispatches = log
            .messages()
            .iter()
            .filter(|m| matches!(m, ExecutorMessage::Start { .. } | ExecutorMessage::End { .. }))
            .count();
        assert_eq!(dispatches, 2);
    }

    #[test]
    fn test_failure_switches_to_the_alternative() {
        // S3: road and air deliveries are exclusive; road fails after start
        let mut slv = SimSolver::new();
        let road = slv.add_interval("road", r(1), r(4));
        let air = slv.add_interval("air", r(1), r(3));
        slv.make_exclusive(&[road, air]);
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);

        exec.start_execution();
        exec.tick().unwrap();
        assert!(exec.executing().contains(&road));

        let failed: BTreeSet<AtomId> = [road].into_iter().collect();
        exec.failure(&failed).unwrap();

        assert_eq!(exec.state(), ExecutorState::Executing);
        assert!(!exec.executing().contains(&road));
        assert_eq!(
            exec.solver().lit_value(exec.solver().atom_sigma(air)),
            Truth::True
        );
        // the replacement plan is back on the timeline
        assert!(!exec.pulses().is_empty());
    }

    #[test]
    fn test_failure_backjump_leaves_no_residual_bounds() {
        // R2: the frozen start of the failed atom is fully retracted
        let mut slv = SimSolver::new();
        let road = slv.add_interval("road", r(1), r(4));
        let air = slv.add_interval("air", r(1), r(3));
        slv.make_exclusive(&[road, air]);
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);

        exec.start_execution();
        exec.tick().unwrap();

        let start = exec.solver().atom_expr(road, "start").unwrap();
        assert_eq!(exec.solver().arith_bounds(start), (inf(1), inf(1)));

        let failed: BTreeSet<AtomId> = [road].into_iter().collect();
        exec.failure(&failed).unwrap();
        assert_eq!(
            exec.solver().arith_bounds(start),
            (inf(1), InfRational::PosInf)
        );
    }

    #[test]
    fn test_horizon_reached_finishes_once() {
        // S4/B2: empty plan, horizon 10
        let mut slv = SimSolver::new();
        slv.set_horizon(r(10));
        let (mut exec, log) = ready(slv);

        exec.start_execution();
        for _ in 0..9 {
            exec.tick().unwrap();
        }
        assert_eq!(exec.state(), ExecutorState::Executing);

        exec.tick().unwrap();
        assert_eq!(exec.state(), ExecutorState::Finished);

        // later ticks only report time
        log.clear();
        exec.tick().unwrap();
        exec.tick().unwrap();
        assert_eq!(
            log.messages(),
            vec![
                ExecutorMessage::Tick { time: r(11) },
                ExecutorMessage::Tick { time: r(12) },
            ]
        );
    }

    #[test]
    fn test_pause_halts_the_clock_and_resume_continues() {
        // S5/P4
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(5));
        slv.set_horizon(r(10));
        let (mut exec, log) = ready(slv);
        let ping = exec.solver().atom_by_name("ping").unwrap();

        exec.start_execution();
        exec.tick().unwrap();
        exec.tick().unwrap();
        assert_eq!(exec.current_time(), r(2));

        exec.pause_execution();
        assert_eq!(exec.state(), ExecutorState::Idle);
        log.clear();
        exec.tick().unwrap();
        assert_eq!(exec.current_time(), r(2));
        assert!(log.messages().is_empty());
        assert!(exec.executing().is_empty());

        exec.start_execution();
        exec.tick().unwrap();
        exec.tick().unwrap();
        exec.tick().unwrap();
        assert_eq!(exec.current_time(), r(5));
        let dispatched = log
            .messages()
            .iter()
            .any(|m| matches!(m, ExecutorMessage::Start { atoms } if atoms == &vec![ping]));
        assert!(dispatched);
    }

    #[test]
    fn test_adaptation_mid_execution_adds_future_atoms() {
        // S6: a new goal arrives at time 4
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(2));
        slv.set_horizon(r(10));
        let (mut exec, log) = ready(slv);

        exec.start_execution();
        for _ in 0..4 {
            exec.tick().unwrap();
        }
        assert_eq!(exec.current_time(), r(4));

        exec.adapt("impulse extra at 6").unwrap();
        log.clear();
        exec.tick().unwrap();

        let states: Vec<ExecutorState> = log
            .messages()
            .iter()
            .filter_map(|m| match m {
                ExecutorMessage::StateChanged { state } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![ExecutorState::Adapting, ExecutorState::Executing]
        );
        assert_eq!(exec.pulses(), vec![inf(6)]);

        exec.tick().unwrap();
        assert_eq!(exec.current_time(), r(6));
        let extra = exec.solver().atom_by_name("extra").unwrap();
        let dispatched = log
            .messages()
            .iter()
            .any(|m| matches!(m, ExecutorMessage::Start { atoms } if atoms == &vec![extra]));
        assert!(dispatched);
    }

    #[test]
    fn test_adapted_goal_in_the_past_is_clamped_to_now() {
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(1));
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);

        exec.start_execution();
        for _ in 0..4 {
            exec.tick().unwrap();
        }

        // the new goal asks for time 1, which is already in the past
        exec.adapt("impulse late at 1").unwrap();
        exec.tick().unwrap();

        let late = exec.solver().atom_by_name("late").unwrap();
        let at = exec.solver().atom_expr(late, "at").unwrap();
        assert_eq!(exec.solver().arith_value(at), inf(4));
        assert!(exec.executing().is_empty());
        assert_bounds_hold(&exec);
    }

    #[test]
    fn test_window_is_half_open() {
        // B1: a pulse equal to the advanced time dispatches, the next
        // window's pulse does not
        let mut slv = SimSolver::new();
        slv.add_impulse("now", r(1));
        slv.add_impulse("next", r(2));
        slv.set_horizon(r(10));
        let (mut exec, log) = ready(slv);
        let now = exec.solver().atom_by_name("now").unwrap();
        let next = exec.solver().atom_by_name("next").unwrap();

        exec.start_execution();
        exec.tick().unwrap();
        let started: Vec<AtomId> = log
            .messages()
            .iter()
            .filter_map(|m| match m {
                ExecutorMessage::Start { atoms } => Some(atoms.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(started, vec![now]);
        assert_eq!(exec.pulses(), vec![inf(2)]);
        assert!(!started.contains(&next));
    }

    #[test]
    fn test_delaying_a_constant_fails_execution() {
        // B3
        let mut slv = SimSolver::new();
        slv.add_impulse_fixed("fixed", r(3));
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);
        let fixed = exec.solver().atom_by_name("fixed").unwrap();
        exec.add_listener(Box::new(DelayStart {
            atom: fixed,
            delay: r(1),
            fired: false,
        }));

        exec.start_execution();
        exec.tick().unwrap();
        exec.tick().unwrap();
        let err = exec.tick().unwrap_err();
        assert!(matches!(err, ExecutionError::ConstantDelayRequested));
        assert_eq!(exec.state(), ExecutorState::Failed);
        assert!(exec.executing().is_empty());
    }

    #[test]
    fn test_non_real_parameters_are_rejected_at_dispatch() {
        let mut slv = SimSolver::new();
        let survey = slv.add_interval("survey", r(1), r(3));
        slv.add_int_param(survey, "passes", 2);
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);

        exec.start_execution();
        let err = exec.tick().unwrap_err();
        assert!(matches!(err, ExecutionError::UnsupportedDomain));
        assert_eq!(exec.state(), ExecutorState::Failed);
    }

    #[test]
    fn test_repeated_delay_requests_are_idempotent() {
        // P5
        let mut slv = SimSolver::new();
        slv.add_interval("survey", r(2), r(8));
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);
        let survey = exec.solver().atom_by_name("survey").unwrap();

        exec.start_execution();
        exec.tick().unwrap();
        let request: HashMap<AtomId, Rational> = [(survey, r(2))].into_iter().collect();
        exec.dont_start_yet(request.clone());
        exec.dont_start_yet(request);
        exec.tick().unwrap();

        let start = exec.solver().atom_expr(survey, "start").unwrap();
        assert_eq!(exec.solver().arith_value(start), inf(4));
    }

    #[test]
    fn test_frozen_parameters_survive_adaptation() {
        // P1 over bool and enum parameters, across a re-solve
        let mut slv = SimSolver::new();
        let survey = slv.add_interval("survey", r(1), r(6));
        slv.add_bool_param(survey, "calibrated", true);
        slv.add_enum_param(survey, "site", &[11, 12, 13]);
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);

        exec.start_execution();
        exec.tick().unwrap();
        assert!(exec.executing().contains(&survey));
        assert_bounds_hold(&exec);

        // a new requirement forces a re-solve; the frozen values must hold
        exec.adapt("impulse extra at 5").unwrap();
        exec.tick().unwrap();
        assert!(exec.executing().contains(&survey));
        assert_bounds_hold(&exec);
    }

    #[test]
    fn test_timeline_matches_active_atoms_after_adaptation() {
        // R1/P2
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(4));
        slv.add_interval("survey", r(5), r(7));
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);

        exec.start_execution();
        exec.tick().unwrap();
        exec.adapt("interval relay from 6 to 9").unwrap();
        exec.tick().unwrap();

        let now = InfRational::from(exec.current_time());
        let pulses = exec.pulses();
        assert_eq!(pulses, vec![inf(4), inf(5), inf(6), inf(7), inf(9)]);
        assert!(pulses.iter().all(|p| *p >= now));
    }

    #[test]
    fn test_state_is_idle_until_execution_starts() {
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(1));
        let (exec, _log) = ready(slv);
        assert_eq!(exec.state(), ExecutorState::Idle);
        assert!(!exec.is_running());
    }

    #[test]
    fn test_fractional_cadence_dispatches_exactly() {
        // half a plan unit per tick: an impulse at 1 fires on the second tick
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(1));
        slv.set_horizon(r(10));
        let config =
            ExecutorConfig::named("halftime").with_units_per_tick(cadence_core::time::rational(1, 2));
        let mut exec = Executor::new(slv, config);
        let log = MessageLog::new();
        exec.add_listener(Box::new(log.clone()));
        assert!(exec.solve().unwrap());
        let ping = exec.solver().atom_by_name("ping").unwrap();

        exec.start_execution();
        exec.tick().unwrap();
        assert_eq!(exec.current_time(), cadence_core::time::rational(1, 2));
        assert!(exec.pulses().contains(&inf(1)));

        exec.tick().unwrap();
        assert_eq!(exec.current_time(), r(1));
        let dispatched = log
            .messages()
            .iter()
            .any(|m| matches!(m, ExecutorMessage::Start { atoms } if atoms == &vec![ping]));
        assert!(dispatched);
    }

    #[test]
    fn test_adaptation_from_script_files() {
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(1));
        slv.set_horizon(r(10));
        let (mut exec, _log) = ready(slv);

        let path = std::env::temp_dir().join(format!("cadence-goals-{}.pln", std::process::id()));
        std::fs::write(&path, "impulse filed at 3\n").unwrap();
        exec.start_execution();
        exec.adapt_files(&[path.to_string_lossy().into_owned()])
            .unwrap();
        exec.tick().unwrap();
        std::fs::remove_file(&path).ok();

        assert!(exec.solver().atom_by_name("filed").is_some());
        assert!(exec.pulses().contains(&inf(3)));
    }

    #[test]
    fn test_adaptation_from_a_missing_file_is_rejected() {
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", r(1));
        let (mut exec, _log) = ready(slv);

        let err = exec
            .adapt_files(&["/nonexistent/cadence-goals.pln".to_string()])
            .unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidScript(_)));
        // a bad script leaves the executor usable
        assert_ne!(exec.state(), ExecutorState::Failed);
    }
}
