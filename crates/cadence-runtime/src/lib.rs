//! # Cadence Runtime
//!
//! Real-time hosting for the cadence executor:
//! - `TickDriver`: the fixed-cadence clock
//! - `SharedExecutor`: mutex-guarded handle with a lock-free running flag
//! - `MessageBus`: broadcast fan-out of executor events to async consumers
//!
//! The executor core stays synchronous; this crate is the seam where it
//! meets threads, time, and transports.

pub mod bus;
pub mod clock;
pub mod shared;

pub use bus::{BroadcastMessageBus, BusError, BusListener, MessageBus, MessageEnvelope};
pub use clock::TickDriver;
pub use shared::SharedExecutor;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use cadence_core::state::ExecutorState;
    use cadence_core::time::Rational;
    use cadence_executor::{Executor, ExecutorConfig, ExecutorMessage};
    use cadence_sim::SimSolver;

    #[test]
    fn test_driver_runs_an_executor_to_the_horizon() {
        tokio_test::block_on(async {
            let mut slv = SimSolver::new();
            slv.add_impulse("ping", Rational::from_integer(2));
            slv.set_horizon(Rational::from_integer(3));
            let mut executor = Executor::new(slv, ExecutorConfig::named("driven"));

            let bus = BroadcastMessageBus::default();
            let mut rx = bus.subscribe();
            executor.add_listener(Box::new(bus.listener("driven")));

            let shared = SharedExecutor::new(executor);
            assert!(shared.solve().unwrap());
            shared.start_execution();

            let ticker = shared.clone();
            let driver = TickDriver::start(Duration::from_millis(2), move || {
                let _ = ticker.tick();
            });

            // wait for the horizon to be reached
            let mut finished = false;
            for _ in 0..200 {
                if shared.state() == ExecutorState::Finished {
                    finished = true;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
            driver.stop().await;
            assert!(finished, "executor never finished");

            // the bus saw the dispatch
            let mut saw_start = false;
            while let Ok(envelope) = rx.try_recv() {
                if matches!(envelope.message, ExecutorMessage::Start { .. }) {
                    saw_start = true;
                }
            }
            assert!(saw_start);
        });
    }
}
