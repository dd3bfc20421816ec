//! Shared executor handle.
//!
//! Wraps an executor in a mutex so the tick driver and command issuers can
//! reach it from different threads. Every command serializes on the lock;
//! the `running` flag is mirrored atomically so observers can poll it
//! without contending with a tick that is blocked on the solver.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cadence_core::error::ExecutionError;
use cadence_core::listener::ExecutorListener;
use cadence_core::solver::{AtomId, Solver};
use cadence_core::state::ExecutorState;
use cadence_core::time::Rational;
use cadence_executor::Executor;

/// Cloneable, thread-safe handle to one executor.
pub struct SharedExecutor<S: Solver> {
    inner: Arc<Mutex<Executor<S>>>,
    running: Arc<AtomicBool>,
}

impl<S: Solver> Clone for SharedExecutor<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            running: Arc::clone(&self.running),
        }
    }
}

impl<S: Solver> SharedExecutor<S> {
    pub fn new(executor: Executor<S>) -> Self {
        let running = executor.running_flag();
        Self {
            inner: Arc::new(Mutex::new(executor)),
            running,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Executor<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a closure against the executor under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&mut Executor<S>) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn add_listener(&self, listener: Box<dyn ExecutorListener>) {
        self.lock().add_listener(listener);
    }

    pub fn solve(&self) -> Result<bool, ExecutionError> {
        self.lock().solve()
    }

    pub fn tick(&self) -> Result<(), ExecutionError> {
        self.lock().tick()
    }

    pub fn adapt(&self, script: &str) -> Result<(), ExecutionError> {
        self.lock().adapt(script)
    }

    pub fn adapt_files(&self, files: &[String]) -> Result<(), ExecutionError> {
        self.lock().adapt_files(files)
    }

    pub fn failure(&self, atoms: &BTreeSet<AtomId>) -> Result<(), ExecutionError> {
        self.lock().failure(atoms)
    }

    pub fn dont_start_yet(&self, atoms: HashMap<AtomId, Rational>) {
        self.lock().dont_start_yet(atoms);
    }

    pub fn dont_end_yet(&self, atoms: HashMap<AtomId, Rational>) {
        self.lock().dont_end_yet(atoms);
    }

    pub fn start_execution(&self) {
        self.lock().start_execution();
    }

    pub fn pause_execution(&self) {
        self.lock().pause_execution();
    }

    pub fn state(&self) -> ExecutorState {
        self.lock().state()
    }

    pub fn current_time(&self) -> Rational {
        self.lock().current_time()
    }

    pub fn executing(&self) -> BTreeSet<AtomId> {
        self.lock().executing().clone()
    }

    /// Lock-free read of the running flag.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::time::Rational;
    use cadence_executor::ExecutorConfig;
    use cadence_sim::SimSolver;

    #[test]
    fn test_commands_flow_through_the_handle() {
        let mut slv = SimSolver::new();
        slv.add_impulse("ping", Rational::from_integer(2));
        slv.set_horizon(Rational::from_integer(5));
        let executor = Executor::new(slv, ExecutorConfig::named("shared"));
        let shared = SharedExecutor::new(executor);

        assert!(shared.solve().unwrap());
        assert!(!shared.is_running());

        shared.start_execution();
        assert!(shared.is_running());
        assert_eq!(shared.state(), ExecutorState::Executing);

        shared.tick().unwrap();
        shared.tick().unwrap();
        assert_eq!(shared.current_time(), Rational::from_integer(2));
        assert!(shared.executing().is_empty());

        let clone = shared.clone();
        clone.pause_execution();
        assert!(!shared.is_running());
    }
}
