//! Executor state machine states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where the executor currently is in its lifecycle.
///
/// `Reasoning` is the initial state, held until the first solution arrives.
/// `Adapting` covers every later re-solve (delays, failures, new
/// requirements). `Finished` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorState {
    /// Solving the problem for the first time.
    Reasoning,
    /// Re-solving to absorb runtime divergence.
    Adapting,
    /// A plan is ready but execution is paused.
    Idle,
    /// Dispatching the plan in real time.
    Executing,
    /// The horizon was reached with nothing left to end.
    Finished,
    /// The plan can no longer be executed.
    Failed,
}

impl ExecutorState {
    /// Whether the executor will never leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutorState::Finished | ExecutorState::Failed)
    }

    /// Whether the solver is currently searching on the executor's behalf.
    pub fn is_solving(&self) -> bool {
        matches!(self, ExecutorState::Reasoning | ExecutorState::Adapting)
    }
}

impl fmt::Display for ExecutorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutorState::Reasoning => "reasoning",
            ExecutorState::Adapting => "adapting",
            ExecutorState::Idle => "idle",
            ExecutorState::Executing => "executing",
            ExecutorState::Finished => "finished",
            ExecutorState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_classification_flags() {
        assert!(ExecutorState::Reasoning.is_solving());
        assert!(ExecutorState::Adapting.is_solving());
        assert!(!ExecutorState::Executing.is_solving());

        assert!(ExecutorState::Finished.is_terminal());
        assert!(ExecutorState::Failed.is_terminal());
        assert!(!ExecutorState::Idle.is_terminal());
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&ExecutorState::Executing).unwrap();
        assert_eq!(json, "\"executing\"");
    }
}
