//! Plan-script reader
//!
//! A line-oriented fixture format for feeding requirements to the simulated
//! solver, one directive per line:
//!
//! ```text
//! # deliveries for the afternoon window
//! impulse ping at 3
//! interval survey from 2 to 5
//! horizon 10
//! ```
//!
//! This is not a planning language; it declares ready-made activities so
//! tests and demos can exercise adaptation.

use cadence_core::error::ExecutionError;
use cadence_core::time::Rational;

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Directive {
    Impulse { name: String, at: Rational },
    Interval { name: String, start: Rational, end: Rational },
    Horizon(Rational),
}

pub(crate) fn parse(script: &str) -> Result<Vec<Directive>, ExecutionError> {
    let mut directives = Vec::new();
    for (lineno, raw) in script.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let directive = match tokens.as_slice() {
            ["impulse", name, "at", at] => Directive::Impulse {
                name: (*name).to_string(),
                at: parse_rational(at, lineno)?,
            },
            ["interval", name, "from", start, "to", end] => Directive::Interval {
                name: (*name).to_string(),
                start: parse_rational(start, lineno)?,
                end: parse_rational(end, lineno)?,
            },
            ["horizon", at] => Directive::Horizon(parse_rational(at, lineno)?),
            _ => {
                return Err(ExecutionError::InvalidScript(format!(
                    "line {}: unrecognized directive '{line}'",
                    lineno + 1
                )))
            }
        };
        directives.push(directive);
    }
    Ok(directives)
}

/// Parse an integer or `numer/denom` fraction.
fn parse_rational(token: &str, lineno: usize) -> Result<Rational, ExecutionError> {
    let bad = || {
        ExecutionError::InvalidScript(format!("line {}: invalid number '{token}'", lineno + 1))
    };
    match token.split_once('/') {
        Some((numer, denom)) => {
            let numer: i64 = numer.parse().map_err(|_| bad())?;
            let denom: i64 = denom.parse().map_err(|_| bad())?;
            if denom == 0 {
                return Err(bad());
            }
            Ok(Rational::new(numer, denom))
        }
        None => {
            let value: i64 = token.parse().map_err(|_| bad())?;
            Ok(Rational::from_integer(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_directives_and_skips_comments() {
        let script = "\n# plan\nimpulse ping at 3\ninterval survey from 2 to 11/2\nhorizon 10\n";
        let directives = parse(script).unwrap();
        assert_eq!(directives.len(), 3);
        assert_eq!(
            directives[1],
            Directive::Interval {
                name: "survey".to_string(),
                start: Rational::from_integer(2),
                end: Rational::new(11, 2),
            }
        );
        assert_eq!(directives[2], Directive::Horizon(Rational::from_integer(10)));
    }

    #[test]
    fn test_rejects_unknown_directives_with_line_numbers() {
        let err = parse("impulse ping at 3\nwarp ping to 9").unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidScript(msg) if msg.contains("line 2")));
    }

    #[test]
    fn test_rejects_zero_denominator() {
        let err = parse("horizon 1/0").unwrap_err();
        assert!(matches!(err, ExecutionError::InvalidScript(_)));
    }
}
