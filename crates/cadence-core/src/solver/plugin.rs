//! The plugin side of the solver seam.
//!
//! The executor is simultaneously a propagation theory embedded in the SAT
//! core and an observer of the solver's lifecycle. The two roles are split
//! into `Theory` and `SolverObserver`; a single value implements both and is
//! handed to every solver control call as `&mut dyn SolverPlugin`.

use super::ids::AtomId;
use super::lit::Lit;
use super::ops::{Solver, SolverOps};
use crate::error::ExecutionError;

/// Outcome of a theory propagation step.
///
/// A conflict carries its explanation clause; the solver feeds it straight
/// into conflict analysis. This replaces a shared writable conflict buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
    Consistent,
    Conflict(Vec<Lit>),
}

impl Propagation {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Propagation::Consistent)
    }
}

/// A propagation theory plugged into the solver's SAT core.
///
/// `on_propagate` fires when a literal over a bound variable becomes true.
/// Only the re-entrant `SolverOps` surface is available inside the callback,
/// so a theory cannot start a nested solve.
pub trait Theory {
    fn on_propagate(&mut self, ops: &mut dyn SolverOps, p: Lit) -> Propagation;

    /// A decision level was opened.
    fn on_push(&mut self) {}

    /// A decision level was undone.
    fn on_pop(&mut self) {}

    /// Final consistency check before a solution is accepted.
    fn on_check(&mut self, _ops: &mut dyn SolverOps) -> Propagation {
        Propagation::Consistent
    }
}

/// Observer of the solver's lifecycle events.
#[allow(unused_variables)]
pub trait SolverObserver {
    /// New requirements were read into the problem.
    fn on_read(&mut self, ops: &mut dyn SolverOps) {}

    /// The solver started searching.
    fn on_started_solving(&mut self, ops: &mut dyn SolverOps) {}

    /// The solver found a solution. The full control surface is available:
    /// the observer may take decisions or trigger further solving.
    fn on_solution_found(&mut self, slv: &mut dyn Solver) -> Result<(), ExecutionError> {
        Ok(())
    }

    /// The problem has no solution.
    fn on_inconsistent_problem(&mut self, ops: &mut dyn SolverOps) {}

    /// The causal search introduced a new atom.
    fn on_flaw_created(&mut self, ops: &mut dyn SolverOps, atom: AtomId) {}
}

/// What the solver hosts: a theory that is also a lifecycle observer.
pub trait SolverPlugin: Theory + SolverObserver {}

impl<T: Theory + SolverObserver> SolverPlugin for T {}
