//! Executor observers and the dispatch-veto channel.

use std::collections::{BTreeSet, HashMap};

use crate::solver::AtomId;
use crate::state::ExecutorState;
use crate::time::Rational;

/// Delay requests collected from listeners during a `starting`/`ending`
/// notification.
///
/// A listener that is not ready for an atom files the extra delay it needs;
/// the dispatcher absorbs the requests in the same tick by pushing the
/// atom's bound forward and re-solving. Filing the same atom twice keeps the
/// first request.
#[derive(Debug, Default)]
pub struct DelayRequests {
    dont_start: HashMap<AtomId, Rational>,
    dont_end: HashMap<AtomId, Rational>,
}

impl DelayRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the dispatcher not to start an atom yet.
    pub fn dont_start_yet(&mut self, atom: AtomId, delay: Rational) {
        self.dont_start.entry(atom).or_insert(delay);
    }

    /// Ask the dispatcher not to end an atom yet.
    pub fn dont_end_yet(&mut self, atom: AtomId, delay: Rational) {
        self.dont_end.entry(atom).or_insert(delay);
    }

    pub fn is_empty(&self) -> bool {
        self.dont_start.is_empty() && self.dont_end.is_empty()
    }

    /// Split into the (start, end) request maps.
    pub fn into_parts(self) -> (HashMap<AtomId, Rational>, HashMap<AtomId, Rational>) {
        (self.dont_start, self.dont_end)
    }
}

/// Observer of executor progress.
///
/// All notifications are synchronous and serial, in tick order:
/// `starting`/`ending` (where delays may be filed), then `start`/`end` once
/// values are frozen, then `tick`. A listener must not block.
#[allow(unused_variables)]
pub trait ExecutorListener: Send {
    /// The executor moved to a new state.
    fn state_changed(&mut self, state: ExecutorState) {}

    /// The clock advanced.
    fn tick(&mut self, time: &Rational) {}

    /// These atoms are about to start; file a delay to hold them back.
    fn starting(&mut self, atoms: &BTreeSet<AtomId>, delays: &mut DelayRequests) {}

    /// These atoms have started; their values are frozen.
    fn start(&mut self, atoms: &BTreeSet<AtomId>) {}

    /// These atoms are about to end; file a delay to hold them back.
    fn ending(&mut self, atoms: &BTreeSet<AtomId>, delays: &mut DelayRequests) {}

    /// These atoms have ended.
    fn end(&mut self, atoms: &BTreeSet<AtomId>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_delay_requests_keep_the_first() {
        let mut delays = DelayRequests::new();
        delays.dont_start_yet(AtomId(1), Rational::from_integer(2));
        delays.dont_start_yet(AtomId(1), Rational::from_integer(9));

        let (starts, ends) = delays.into_parts();
        assert_eq!(starts[&AtomId(1)], Rational::from_integer(2));
        assert!(ends.is_empty());
    }
}
