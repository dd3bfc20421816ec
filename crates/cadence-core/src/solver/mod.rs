//! Solver-facing abstractions
//!
//! The constraint solver (SAT core, linear-rational theory, ordered-values
//! theory, causal search) is a black box behind these traits. The executor
//! consumes `SolverOps`/`Solver` and plugs back in through
//! `Theory`/`SolverObserver`.
//!
//! Note: implementations live elsewhere; `cadence-sim` ships the in-memory
//! reference solver used by tests and demos.

mod ids;
mod lit;
mod ops;
mod plugin;

pub use ids::{
    expr, ArithBounds, AtomId, AtomKind, ExprId, ExprShape, LinVar, OvVar, PredicateId, TypeId,
    ValueRef,
};
pub use lit::{Lit, Truth, Var};
pub use ops::{Solver, SolverOps};
pub use plugin::{Propagation, SolverObserver, SolverPlugin, Theory};
