//! Message bus - realtime fan-out of executor events.
//!
//! The bus complements the in-process listeners: listeners are synchronous
//! and serial inside the tick, the bus pushes the same events to async
//! subscribers (UIs, transports) without ever blocking the dispatcher.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;

use cadence_core::listener::{DelayRequests, ExecutorListener};
use cadence_core::solver::AtomId;
use cadence_core::state::ExecutorState;
use cadence_core::time::Rational;
use cadence_executor::ExecutorMessage;

/// An executor message stamped with its origin and wall-clock time.
#[derive(Debug, Clone, Serialize)]
pub struct MessageEnvelope {
    /// Name of the executor that emitted the message.
    pub executor: String,
    /// Wall-clock emission time.
    pub emitted_at: DateTime<Utc>,
    pub message: ExecutorMessage,
}

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Bus closed")]
    Closed,
}

/// Async publish/subscribe interface for executor messages.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish an envelope to all active subscribers.
    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), BusError>;

    /// Subscribe to realtime envelopes.
    fn subscribe(&self) -> broadcast::Receiver<MessageEnvelope>;
}

/// In-process bus based on tokio broadcast channels.
pub struct BroadcastMessageBus {
    tx: broadcast::Sender<MessageEnvelope>,
    capacity: usize,
}

impl BroadcastMessageBus {
    /// Create a new broadcast bus with channel capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Return the configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// A listener that forwards one executor's events onto this bus.
    pub fn listener(&self, executor: impl Into<String>) -> BusListener {
        BusListener {
            executor: executor.into(),
            tx: self.tx.clone(),
        }
    }
}

impl Default for BroadcastMessageBus {
    fn default() -> Self {
        // default capacity for local realtime consumers
        Self::new(1024)
    }
}

#[async_trait]
impl MessageBus for BroadcastMessageBus {
    async fn publish(&self, envelope: MessageEnvelope) -> Result<(), BusError> {
        // "no receiver" is not an error; listeners remain source-of-truth
        match self.tx.send(envelope) {
            Ok(_) => Ok(()),
            Err(broadcast::error::SendError(_)) => Ok(()),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<MessageEnvelope> {
        self.tx.subscribe()
    }
}

/// Executor listener that forwards events onto a broadcast bus.
pub struct BusListener {
    executor: String,
    tx: broadcast::Sender<MessageEnvelope>,
}

impl BusListener {
    fn forward(&self, message: ExecutorMessage) {
        let envelope = MessageEnvelope {
            executor: self.executor.clone(),
            emitted_at: Utc::now(),
            message,
        };
        if self.tx.send(envelope).is_err() {
            tracing::trace!(executor = %self.executor, "no bus subscribers");
        }
    }

    fn atoms(set: &BTreeSet<AtomId>) -> Vec<AtomId> {
        set.iter().copied().collect()
    }
}

impl ExecutorListener for BusListener {
    fn state_changed(&mut self, state: ExecutorState) {
        self.forward(ExecutorMessage::StateChanged { state });
    }

    fn tick(&mut self, time: &Rational) {
        self.forward(ExecutorMessage::Tick { time: *time });
    }

    fn starting(&mut self, atoms: &BTreeSet<AtomId>, _delays: &mut DelayRequests) {
        self.forward(ExecutorMessage::Starting {
            atoms: Self::atoms(atoms),
        });
    }

    fn start(&mut self, atoms: &BTreeSet<AtomId>) {
        self.forward(ExecutorMessage::Start {
            atoms: Self::atoms(atoms),
        });
    }

    fn ending(&mut self, atoms: &BTreeSet<AtomId>, _delays: &mut DelayRequests) {
        self.forward(ExecutorMessage::Ending {
            atoms: Self::atoms(atoms),
        });
    }

    fn end(&mut self, atoms: &BTreeSet<AtomId>) {
        self.forward(ExecutorMessage::End {
            atoms: Self::atoms(atoms),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_delivers_listener_events_to_subscribers() {
        tokio_test::block_on(async {
            let bus = BroadcastMessageBus::new(16);
            let mut rx = bus.subscribe();
            let mut listener = bus.listener("rover");

            listener.tick(&Rational::from_integer(3));

            let envelope = rx.recv().await.expect("envelope");
            assert_eq!(envelope.executor, "rover");
            assert_eq!(
                envelope.message,
                ExecutorMessage::Tick {
                    time: Rational::from_integer(3)
                }
            );
        });
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        tokio_test::block_on(async {
            let bus = BroadcastMessageBus::new(4);
            let envelope = MessageEnvelope {
                executor: "rover".to_string(),
                emitted_at: Utc::now(),
                message: ExecutorMessage::StateChanged {
                    state: ExecutorState::Idle,
                },
            };
            bus.publish(envelope).await.unwrap();
        });
    }

    #[test]
    fn test_envelope_serializes_with_timestamp() {
        let envelope = MessageEnvelope {
            executor: "rover".to_string(),
            emitted_at: Utc::now(),
            message: ExecutorMessage::Tick {
                time: Rational::from_integer(1),
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["executor"], "rover");
        assert_eq!(json["message"]["type"], "tick");
        assert!(json["emitted_at"].is_string());
    }
}
