//! Exact plan-time arithmetic
//!
//! Plan time is rational, never floating point: pulses produced by the
//! solver must compare exactly, and a tick that lands on a pulse has to be
//! recognized as landing on it. Scheduling additionally needs a strict
//! "just after" ordering, which the infinitesimal component provides.

use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Exact rational scalar for wall-plan time.
pub type Rational = num_rational::Ratio<i64>;

/// Build a rational from an integer numerator/denominator pair.
pub fn rational(numer: i64, denom: i64) -> Rational {
    Rational::new(numer, denom)
}

/// A rational extended with an integer infinitesimal multiplier and the two
/// infinities.
///
/// Finite values order lexicographically on `(value, eps)`, so `3` < `3 + ε`
/// < `3 + 2ε` < `4 - ε` never ties: strictly-less-than constraints coming
/// out of the solver stay strict on the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InfRational {
    NegInf,
    Finite { value: Rational, eps: i64 },
    PosInf,
}

impl InfRational {
    /// A finite value with no infinitesimal component.
    pub fn finite(value: Rational) -> Self {
        InfRational::Finite { value, eps: 0 }
    }

    /// A finite value with an explicit infinitesimal multiplier.
    pub fn with_eps(value: Rational, eps: i64) -> Self {
        InfRational::Finite { value, eps }
    }

    pub fn is_finite(&self) -> bool {
        matches!(self, InfRational::Finite { .. })
    }

    /// The rational component, if finite.
    pub fn value(&self) -> Option<Rational> {
        match self {
            InfRational::Finite { value, .. } => Some(*value),
            _ => None,
        }
    }

    /// The infinitesimal multiplier of a finite value, zero otherwise.
    pub fn eps(&self) -> i64 {
        match self {
            InfRational::Finite { eps, .. } => *eps,
            _ => 0,
        }
    }
}

impl From<Rational> for InfRational {
    fn from(value: Rational) -> Self {
        InfRational::finite(value)
    }
}

impl From<i64> for InfRational {
    fn from(value: i64) -> Self {
        InfRational::finite(Rational::from_integer(value))
    }
}

impl Add<Rational> for InfRational {
    type Output = InfRational;

    fn add(self, rhs: Rational) -> InfRational {
        match self {
            InfRational::Finite { value, eps } => InfRational::Finite { value: value + rhs, eps },
            inf => inf,
        }
    }
}

impl Sub<Rational> for InfRational {
    type Output = InfRational;

    fn sub(self, rhs: Rational) -> InfRational {
        match self {
            InfRational::Finite { value, eps } => InfRational::Finite { value: value - rhs, eps },
            inf => inf,
        }
    }
}

impl fmt::Display for InfRational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfRational::NegInf => write!(f, "-inf"),
            InfRational::PosInf => write!(f, "+inf"),
            InfRational::Finite { value, eps } => match eps {
                0 => write!(f, "{value}"),
                e if *e > 0 => write!(f, "{value}+{e}\u{03b5}"),
                e => write!(f, "{value}{e}\u{03b5}"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_order_is_lexicographic_on_value_then_eps() {
        let three = InfRational::from(3);
        let three_eps = InfRational::with_eps(Rational::from_integer(3), 1);
        let almost_four = InfRational::with_eps(Rational::from_integer(4), -1);
        let four = InfRational::from(4);

        assert!(three < three_eps);
        assert!(three_eps < almost_four);
        assert!(almost_four < four);
    }

    #[test]
    fn test_infinities_bound_every_finite_value() {
        let big = InfRational::from(i64::MAX / 2);
        assert!(InfRational::NegInf < big);
        assert!(big < InfRational::PosInf);
        assert!(InfRational::NegInf < InfRational::PosInf);
    }

    #[test]
    fn test_addition_absorbs_into_infinity() {
        let delta = rational(3, 2);
        assert_eq!(InfRational::PosInf + delta, InfRational::PosInf);
        assert_eq!(
            InfRational::from(2) + delta,
            InfRational::finite(rational(7, 2))
        );
    }

    #[test]
    fn test_display_renders_eps_and_infinities() {
        assert_eq!(InfRational::from(3).to_string(), "3");
        assert_eq!(
            InfRational::with_eps(Rational::from_integer(3), 2).to_string(),
            "3+2\u{03b5}"
        );
        assert_eq!(InfRational::PosInf.to_string(), "+inf");
    }
}
