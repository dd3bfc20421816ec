//! # Cadence Sim
//!
//! In-memory reference solver for the cadence executor. Stands in for the
//! production constraint solver in tests and demos: it implements the
//! `cadence_core::solver` traits over a trail-based SAT assignment, a
//! linear-rational bound store with backjump undo, ordered-values
//! variables, and alternative-group plan selection. It does no causal
//! search: activities are declared ready-made, through the builder API or
//! the plan-script reader.

mod script;
mod solver;

pub use solver::SimSolver;
