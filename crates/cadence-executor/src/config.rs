//! Executor configuration.

use cadence_core::time::Rational;
use serde::Deserialize;

/// Configuration for one executor.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorConfig {
    /// Plan-time units the clock advances per tick.
    #[serde(default = "default_units_per_tick")]
    pub units_per_tick: Rational,
    /// Optional display name; a generated id is used when absent.
    #[serde(default)]
    pub name: Option<String>,
}

fn default_units_per_tick() -> Rational {
    Rational::from_integer(1)
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            units_per_tick: default_units_per_tick(),
            name: None,
        }
    }
}

impl ExecutorConfig {
    /// Config with a display name and the default cadence.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Override the plan-time units per tick.
    pub fn with_units_per_tick(mut self, units_per_tick: Rational) -> Self {
        self.units_per_tick = units_per_tick;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_cadence_is_one_unit_per_tick() {
        let config = ExecutorConfig::default();
        assert_eq!(config.units_per_tick, Rational::from_integer(1));
        assert!(config.name.is_none());
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let config: ExecutorConfig = serde_json::from_str("{\"name\":\"rover\"}").unwrap();
        assert_eq!(config.name.as_deref(), Some("rover"));
        assert_eq!(config.units_per_tick, Rational::from_integer(1));
    }
}
