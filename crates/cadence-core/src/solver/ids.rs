//! Opaque handles into the solver's arenas.
//!
//! The solver owns atoms, expressions, predicates, and theory variables; the
//! executor only ever holds their identities. All handles are plain indices
//! allocated by the solver and stable for the process lifetime.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::lit::Lit;
use crate::time::InfRational;

macro_rules! solver_id {
    ($(#[$doc:meta])* $name:ident($repr:ty), $prefix:literal) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub $repr);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

solver_id!(
    /// Identity of a planning atom.
    AtomId(u64),
    "a"
);
solver_id!(
    /// Identity of a solver-managed expression.
    ExprId(u64),
    "x"
);
solver_id!(
    /// Identity of a predicate.
    PredicateId(u32),
    "p"
);
solver_id!(
    /// Identity of a complex (non-primitive) type.
    TypeId(u32),
    "t"
);
solver_id!(
    /// A variable of the linear-rational theory.
    LinVar(u32),
    "l"
);
solver_id!(
    /// A variable of the ordered-values theory.
    OvVar(u32),
    "o"
);
solver_id!(
    /// A reference to a domain value, as held by an ordered-values variable.
    ValueRef(u64),
    "v"
);

/// Temporal shape of a predicate and of its atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomKind {
    /// A single time point, carried by the `at` expression.
    Impulse,
    /// A time span, carried by `start`, `end`, and `duration`.
    Interval,
}

/// Well-known expression names on temporal atoms.
pub mod expr {
    pub const AT: &str = "at";
    pub const START: &str = "start";
    pub const END: &str = "end";
    pub const DURATION: &str = "duration";
}

/// What backs an expression inside the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprShape {
    /// A propositional expression backed by a SAT literal.
    Bool { lit: Lit },
    /// A linear combination over rational variables; `real` is false for
    /// arithmetic domains the executor does not adapt.
    Arith { real: bool },
    /// An ordered-values variable ranging over domain references.
    Enum { var: OvVar },
}

/// Arithmetic bounds of an expression, as reported by the solver.
pub type ArithBounds = (InfRational, InfRational);
