//! End-to-end plan execution example
//!
//! This example demonstrates:
//! - Building a small temporal problem on the simulated solver
//! - Driving the executor with the tick driver
//! - Vetoing a start with a delay request from a listener
//! - Watching progress on the broadcast message bus

use std::collections::BTreeSet;
use std::time::Duration;

use cadence_core::listener::{DelayRequests, ExecutorListener};
use cadence_core::solver::AtomId;
use cadence_core::state::ExecutorState;
use cadence_core::time::Rational;
use cadence_executor::{Executor, ExecutorConfig};
use cadence_runtime::{BroadcastMessageBus, MessageBus, SharedExecutor, TickDriver};
use cadence_sim::SimSolver;

/// Holds the survey back by two time units the first time it tries to start.
struct CautiousOperator {
    survey: AtomId,
    vetoed: bool,
}

impl ExecutorListener for CautiousOperator {
    fn starting(&mut self, atoms: &BTreeSet<AtomId>, delays: &mut DelayRequests) {
        if !self.vetoed && atoms.contains(&self.survey) {
            println!("operator: not ready for the survey, asking for 2 more units");
            delays.dont_start_yet(self.survey, Rational::from_integer(2));
            self.vetoed = true;
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // a small plan: a ping, then a survey window
    let mut solver = SimSolver::new();
    solver.add_impulse("ping", Rational::from_integer(1));
    let survey = solver.add_interval("survey", Rational::from_integer(2), Rational::from_integer(4));
    solver.set_horizon(Rational::from_integer(8));

    let mut executor = Executor::new(solver, ExecutorConfig::named("demo"));
    executor.add_listener(Box::new(CautiousOperator {
        survey,
        vetoed: false,
    }));

    let bus = BroadcastMessageBus::default();
    let mut events = bus.subscribe();
    executor.add_listener(Box::new(bus.listener("demo")));

    let shared = SharedExecutor::new(executor);
    shared.solve().expect("initial plan");
    shared.start_execution();

    let ticker = shared.clone();
    let driver = TickDriver::start(Duration::from_millis(50), move || {
        if let Err(err) = ticker.tick() {
            eprintln!("execution failed: {err}");
        }
    });

    while shared.state() != ExecutorState::Finished {
        if let Ok(envelope) = events.try_recv() {
            println!(
                "[{}] {}",
                envelope.executor,
                serde_json::to_string(&envelope.message).expect("serializable message")
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    driver.stop().await;
    println!("plan executed to the horizon");
}
