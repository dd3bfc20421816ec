//! # Cadence Executor
//!
//! The plan execution engine: drives a constraint-solver-produced plan
//! through real time.
//!
//! This crate contains:
//! - The atom adaptation store (what the executor has told the solver)
//! - The execution theory (guard-literal re-assertion on backtrack)
//! - The pulse timeline (solution projected onto dispatchable pulses)
//! - The dispatcher and its state machine
//! - Serializable executor messages and the multi-executor registry
//!
//! The solver behind `cadence_core::solver::Solver` is an external
//! collaborator; `cadence-sim` ships the reference implementation used in
//! tests.

pub mod adaptation;
pub mod config;
pub mod executor;
pub mod message;
pub mod multi;
mod theory;
pub mod timeline;

pub use adaptation::{AdaptationStore, AtomAdaptation, Bound};
pub use config::ExecutorConfig;
pub use executor::Executor;
pub use message::{ExecutorMessage, MessageLog};
pub use multi::{ExecutorId, MultiExecutor, MultiExecutorError, MultiExecutorListener};
pub use timeline::{relevant_predicates, DispatchRecord, PulseTimeline};
