//! # Cadence Core
//!
//! Core abstractions for the cadence plan executor.
//!
//! This crate contains:
//! - Exact rational plan time (`Rational`, `InfRational`)
//! - The solver interface: SAT literals, opaque handles, operation traits,
//!   and the propagation-theory / observer plugin seam
//! - Executor state and listener definitions
//! - The execution error taxonomy
//!
//! This crate does NOT care about:
//! - How the solver searches (the solver is an external collaborator)
//! - Real time (the runtime crate hosts the clock)
//! - How progress is displayed or transported

pub mod error;
pub mod listener;
pub mod solver;
pub mod state;
pub mod time;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::ExecutionError;
    pub use crate::listener::{DelayRequests, ExecutorListener};
    pub use crate::solver::{
        expr, ArithBounds, AtomId, AtomKind, ExprId, ExprShape, LinVar, Lit, OvVar, PredicateId,
        Propagation, Solver, SolverObserver, SolverOps, SolverPlugin, Theory, Truth, TypeId,
        ValueRef, Var,
    };
    pub use crate::state::ExecutorState;
    pub use crate::time::{rational, InfRational, Rational};
}

pub use error::ExecutionError;
pub use listener::{DelayRequests, ExecutorListener};
pub use solver::{AtomId, AtomKind, ExprId, Lit, Solver, SolverOps, Truth};
pub use state::ExecutorState;
pub use time::{InfRational, Rational};
