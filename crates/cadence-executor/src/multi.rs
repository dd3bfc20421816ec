//! Multi-executor registry
//!
//! Hosts several independent executors, each behind its own mutex, and fans
//! their events out to pool-level listeners tagged with the executor id.
//! Delay vetoes stay per-executor: pool listeners observe, they do not
//! steer.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;

use cadence_core::listener::{DelayRequests, ExecutorListener};
use cadence_core::solver::{AtomId, Solver};
use cadence_core::state::ExecutorState;
use cadence_core::time::Rational;

use crate::config::ExecutorConfig;
use crate::executor::Executor;

/// Identifier of an executor within the pool.
pub type ExecutorId = String;

/// Registry errors.
#[derive(Debug, Error)]
pub enum MultiExecutorError {
    /// An executor with this name already exists.
    #[error("An executor named '{0}' already exists")]
    DuplicateName(String),

    /// No executor with this id.
    #[error("Executor '{0}' not found")]
    NotFound(String),

    /// The executor is still running.
    #[error("Executor '{0}' is still running")]
    StillRunning(String),
}

/// Observer of every executor in the pool.
#[allow(unused_variables)]
pub trait MultiExecutorListener: Send {
    fn executor_created(&mut self, id: &ExecutorId) {}
    fn executor_removed(&mut self, id: &ExecutorId) {}
    fn state_changed(&mut self, id: &ExecutorId, state: ExecutorState) {}
    fn tick(&mut self, id: &ExecutorId, time: &Rational) {}
    fn starting(&mut self, id: &ExecutorId, atoms: &BTreeSet<AtomId>) {}
    fn start(&mut self, id: &ExecutorId, atoms: &BTreeSet<AtomId>) {}
    fn ending(&mut self, id: &ExecutorId, atoms: &BTreeSet<AtomId>) {}
    fn end(&mut self, id: &ExecutorId, atoms: &BTreeSet<AtomId>) {}
}

type SharedListeners = Arc<Mutex<Vec<Box<dyn MultiExecutorListener>>>>;

/// Per-executor listener that forwards into the pool's listener set.
struct Forwarder {
    id: ExecutorId,
    sinks: SharedListeners,
}

impl Forwarder {
    fn each(&self, f: impl FnMut(&mut Box<dyn MultiExecutorListener>)) {
        self.sinks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_mut()
            .for_each(f);
    }
}

impl ExecutorListener for Forwarder {
    fn state_changed(&mut self, state: ExecutorState) {
        let id = self.id.clone();
        self.each(|l| l.state_changed(&id, state));
    }

    fn tick(&mut self, time: &Rational) {
        let id = self.id.clone();
        self.each(|l| l.tick(&id, time));
    }

    fn starting(&mut self, atoms: &BTreeSet<AtomId>, _delays: &mut DelayRequests) {
        let id = self.id.clone();
        self.each(|l| l.starting(&id, atoms));
    }

    fn start(&mut self, atoms: &BTreeSet<AtomId>) {
        let id = self.id.clone();
        self.each(|l| l.start(&id, atoms));
    }

    fn ending(&mut self, atoms: &BTreeSet<AtomId>, _delays: &mut DelayRequests) {
        let id = self.id.clone();
        self.each(|l| l.ending(&id, atoms));
    }

    fn end(&mut self, atoms: &BTreeSet<AtomId>) {
        let id = self.id.clone();
        self.each(|l| l.end(&id, atoms));
    }
}

/// A pool of named executors.
pub struct MultiExecutor<S: Solver> {
    executors: HashMap<ExecutorId, Arc<Mutex<Executor<S>>>>,
    listeners: SharedListeners,
}

impl<S: Solver> MultiExecutor<S> {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Register a pool-level listener.
    pub fn add_listener(&self, listener: Box<dyn MultiExecutorListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Create an executor around a solver. The config name becomes its id;
    /// unnamed executors get a generated one.
    pub fn new_executor(
        &mut self,
        solver: S,
        config: ExecutorConfig,
    ) -> Result<ExecutorId, MultiExecutorError> {
        let mut executor = Executor::new(solver, config);
        let id: ExecutorId = executor.name().to_string();
        if self.executors.contains_key(&id) {
            return Err(MultiExecutorError::DuplicateName(id));
        }
        executor.add_listener(Box::new(Forwarder {
            id: id.clone(),
            sinks: Arc::clone(&self.listeners),
        }));
        self.executors
            .insert(id.clone(), Arc::new(Mutex::new(executor)));
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_mut()
            .for_each(|l| l.executor_created(&id));
        Ok(id)
    }

    /// Handle to an executor; lock it to issue commands.
    pub fn executor(&self, id: &str) -> Option<Arc<Mutex<Executor<S>>>> {
        self.executors.get(id).cloned()
    }

    /// Remove a stopped executor.
    pub fn remove_executor(&mut self, id: &str) -> Result<(), MultiExecutorError> {
        let executor = self
            .executors
            .get(id)
            .ok_or_else(|| MultiExecutorError::NotFound(id.to_string()))?;
        let running = executor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_running();
        if running {
            return Err(MultiExecutorError::StillRunning(id.to_string()));
        }
        self.executors.remove(id);
        let id = id.to_string();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter_mut()
            .for_each(|l| l.executor_removed(&id));
        Ok(())
    }

    pub fn ids(&self) -> Vec<ExecutorId> {
        self.executors.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

impl<S: Solver> Default for MultiExecutor<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_sim::SimSolver;

    #[derive(Default, Clone)]
    struct PoolLog {
        events: Arc<Mutex<Vec<String>>>,
    }

    impl PoolLog {
        fn events(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn push(&self, event: String) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
        }
    }

    impl MultiExecutorListener for PoolLog {
        fn executor_created(&mut self, id: &ExecutorId) {
            self.push(format!("created {id}"));
        }

        fn executor_removed(&mut self, id: &ExecutorId) {
            self.push(format!("removed {id}"));
        }

        fn tick(&mut self, id: &ExecutorId, time: &Rational) {
            self.push(format!("tick {id} {time}"));
        }
    }

    #[test]
    fn test_events_carry_the_executor_id() {
        let mut pool: MultiExecutor<SimSolver> = MultiExecutor::new();
        let log = PoolLog::default();
        pool.add_listener(Box::new(log.clone()));

        let rover = pool
            .new_executor(SimSolver::new(), crate::ExecutorConfig::named("rover"))
            .unwrap();
        let lander = pool
            .new_executor(SimSolver::new(), crate::ExecutorConfig::named("lander"))
            .unwrap();
        assert_eq!(pool.len(), 2);

        {
            let handle = pool.executor(&rover).unwrap();
            let mut exec = handle.lock().unwrap();
            assert!(exec.solve().unwrap());
            exec.start_execution();
            exec.tick().unwrap();
            exec.pause_execution();
        }
        pool.remove_executor(&lander).unwrap();

        let events = log.events();
        assert!(events.contains(&"created rover".to_string()));
        assert!(events.contains(&"tick rover 1".to_string()));
        assert!(events.contains(&"removed lander".to_string()));
        assert!(!events.iter().any(|e| e.starts_with("tick lander")));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let mut pool: MultiExecutor<SimSolver> = MultiExecutor::new();
        pool.new_executor(SimSolver::new(), crate::ExecutorConfig::named("rover"))
            .unwrap();
        let err = pool
            .new_executor(SimSolver::new(), crate::ExecutorConfig::named("rover"))
            .unwrap_err();
        assert!(matches!(err, MultiExecutorError::DuplicateName(_)));
    }

    #[test]
    fn test_running_executors_cannot_be_removed() {
        let mut pool: MultiExecutor<SimSolver> = MultiExecutor::new();
        let rover = pool
            .new_executor(SimSolver::new(), crate::ExecutorConfig::named("rover"))
            .unwrap();
        {
            let handle = pool.executor(&rover).unwrap();
            let mut exec = handle.lock().unwrap();
            assert!(exec.solve().unwrap());
            exec.start_execution();
        }
        let err = pool.remove_executor(&rover).unwrap_err();
        assert!(matches!(err, MultiExecutorError::StillRunning(_)));
        assert_eq!(pool.ids(), vec![rover]);
    }
}
