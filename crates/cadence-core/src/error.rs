//! Execution error taxonomy
//!
//! Bound rejections are recovered locally through the solver's
//! conflict-driven backjump; everything else here is terminal for the
//! executor instance and leaves it in the `Failed` state.

use thiserror::Error;

use crate::solver::AtomId;

/// Errors raised by the executor when recovery is impossible.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The solver reported the problem inconsistent after reading new
    /// requirements.
    #[error("The problem became inconsistent")]
    InconsistentProblem,

    /// The execution guard (or one of its per-atom guards) was forced false
    /// while the plan still demands it: the plan can no longer be executed.
    #[error("The plan can no longer be executed")]
    UnsatisfiableUnderExecution,

    /// A listener asked to delay an expression the solver treats as a
    /// constant.
    #[error("Cannot delay a constant expression")]
    ConstantDelayRequested,

    /// The expression is outside the linear-rational domain; only real-typed
    /// arithmetic can be delayed or frozen.
    #[error("Expression is outside the linear-rational domain")]
    UnsupportedDomain,

    /// A numeric theory rejected an execution bound and the backjump that
    /// followed could not restore consistency.
    #[error("A theory rejected an execution bound and recovery failed")]
    TheoryConflict,

    /// The delay-absorb/re-solve cycle exceeded its per-tick bound.
    #[error("Exceeded {0} re-solves within a single tick")]
    ExhaustedResolve(usize),

    /// An atom was dispatched without a recorded adaptation; the solver
    /// never announced it.
    #[error("No adaptation recorded for atom {0}")]
    UnknownAtom(AtomId),

    /// A dispatched atom is missing one of its well-known expressions.
    #[error("Atom {atom} has no `{name}` expression")]
    MissingExpression {
        atom: AtomId,
        name: &'static str,
    },

    /// The planning script handed to `adapt` could not be read.
    #[error("Invalid planning script: {0}")]
    InvalidScript(String),
}
