//! Serializable executor messages
//!
//! Mirror of the listener events in a wire-friendly shape, for UIs and
//! transports downstream of the executor. `MessageLog` is the in-process
//! journal: it records every event behind a shared handle, which also makes
//! it the assertion surface of choice in tests.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use cadence_core::listener::{DelayRequests, ExecutorListener};
use cadence_core::solver::AtomId;
use cadence_core::state::ExecutorState;
use cadence_core::time::Rational;

/// One executor event, ready for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutorMessage {
    StateChanged { state: ExecutorState },
    Tick { time: Rational },
    Starting { atoms: Vec<AtomId> },
    Start { atoms: Vec<AtomId> },
    Ending { atoms: Vec<AtomId> },
    End { atoms: Vec<AtomId> },
}

impl ExecutorMessage {
    fn atoms(set: &BTreeSet<AtomId>) -> Vec<AtomId> {
        set.iter().copied().collect()
    }
}

/// Listener that journals every event it sees.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Arc<Mutex<Vec<ExecutorMessage>>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn messages(&self) -> Vec<ExecutorMessage> {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn push(&self, message: ExecutorMessage) {
        self.messages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
    }
}

impl ExecutorListener for MessageLog {
    fn state_changed(&mut self, state: ExecutorState) {
        self.push(ExecutorMessage::StateChanged { state });
    }

    fn tick(&mut self, time: &Rational) {
        self.push(ExecutorMessage::Tick { time: *time });
    }

    fn starting(&mut self, atoms: &BTreeSet<AtomId>, _delays: &mut DelayRequests) {
        self.push(ExecutorMessage::Starting {
            atoms: ExecutorMessage::atoms(atoms),
        });
    }

    fn start(&mut self, atoms: &BTreeSet<AtomId>) {
        self.push(ExecutorMessage::Start {
            atoms: ExecutorMessage::atoms(atoms),
        });
    }

    fn ending(&mut self, atoms: &BTreeSet<AtomId>, _delays: &mut DelayRequests) {
        self.push(ExecutorMessage::Ending {
            atoms: ExecutorMessage::atoms(atoms),
        });
    }

    fn end(&mut self, atoms: &BTreeSet<AtomId>) {
        self.push(ExecutorMessage::End {
            atoms: ExecutorMessage::atoms(atoms),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_serialize_tagged_snake_case() {
        let message = ExecutorMessage::Start {
            atoms: vec![AtomId(3)],
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "start");
        assert_eq!(json["atoms"][0], 3);
    }

    #[test]
    fn test_log_records_in_listener_order() {
        let log = MessageLog::new();
        let mut listener = log.clone();

        let atoms: BTreeSet<AtomId> = [AtomId(1)].into_iter().collect();
        let mut delays = DelayRequests::new();
        listener.starting(&atoms, &mut delays);
        listener.start(&atoms);
        listener.tick(&Rational::from_integer(1));

        let recorded = log.messages();
        assert_eq!(recorded.len(), 3);
        assert!(matches!(recorded[0], ExecutorMessage::Starting { .. }));
        assert!(matches!(recorded[2], ExecutorMessage::Tick { .. }));
    }
}
