//! Count-based sliding window of call outcomes.

use std::collections::VecDeque;
use std::time::Duration;

/// How a completed call is accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallOutcome {
    /// Succeeded within the slow-call threshold.
    Success,
    /// Failed within the slow-call threshold.
    Failure,
    /// Succeeded, but took at least the slow-call threshold.
    SlowSuccess,
    /// Failed and took at least the slow-call threshold.
    SlowFailure,
    /// Failed with an ignored kind; never enters the window.
    Ignored,
}

impl CallOutcome {
    /// Classifies a non-ignored call from whether it failed and how long it took.
    pub fn from_call(failed: bool, duration: Duration, slow_threshold: Duration) -> Self {
        let slow = duration >= slow_threshold;
        match (failed, slow) {
            (false, false) => CallOutcome::Success,
            (true, false) => CallOutcome::Failure,
            (false, true) => CallOutcome::SlowSuccess,
            (true, true) => CallOutcome::SlowFailure,
        }
    }

    /// True for `Failure` and `SlowFailure`.
    pub fn is_failure(self) -> bool {
        matches!(self, CallOutcome::Failure | CallOutcome::SlowFailure)
    }

    /// True for `SlowSuccess` and `SlowFailure`.
    pub fn is_slow(self) -> bool {
        matches!(self, CallOutcome::SlowSuccess | CallOutcome::SlowFailure)
    }
}

/// A fixed-capacity FIFO ring of the most recent call outcomes.
///
/// The window never holds more than `capacity` entries; recording into a
/// full window evicts the oldest entry. [`CallOutcome::Ignored`] is not
/// stored, so it counts toward neither the numerator nor the denominator of
/// any rate.
#[derive(Debug, Clone)]
pub struct SlidingWindowMetrics {
    capacity: usize,
    outcomes: VecDeque<CallOutcome>,
    failed: usize,
    slow: usize,
}

impl SlidingWindowMetrics {
    /// Creates an empty window. A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            outcomes: VecDeque::with_capacity(capacity),
            failed: 0,
            slow: 0,
        }
    }

    /// Appends `outcome`, evicting the oldest entry when full.
    ///
    /// Returns `false` (and changes nothing) for an ignored outcome.
    pub fn record(&mut self, outcome: CallOutcome) -> bool {
        if outcome == CallOutcome::Ignored {
            return false;
        }
        if self.outcomes.len() == self.capacity {
            if let Some(evicted) = self.outcomes.pop_front() {
                self.forget(evicted);
            }
        }
        if outcome.is_failure() {
            self.failed += 1;
        }
        if outcome.is_slow() {
            self.slow += 1;
        }
        self.outcomes.push_back(outcome);
        true
    }

    fn forget(&mut self, outcome: CallOutcome) {
        if outcome.is_failure() {
            self.failed -= 1;
        }
        if outcome.is_slow() {
            self.slow -= 1;
        }
    }

    /// Discards every recorded outcome.
    pub fn reset(&mut self) {
        self.outcomes.clear();
        self.failed = 0;
        self.slow = 0;
    }

    /// Maximum number of outcomes held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of outcomes currently held.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// True when no outcome is held.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True once `capacity` outcomes are held.
    pub fn is_full(&self) -> bool {
        self.outcomes.len() == self.capacity
    }

    /// Failures (slow or not) in the window.
    pub fn failed_calls(&self) -> usize {
        self.failed
    }

    /// Slow calls (successful or not) in the window.
    pub fn slow_calls(&self) -> usize {
        self.slow
    }

    /// Non-failed calls in the window.
    pub fn successful_calls(&self) -> usize {
        self.outcomes.len() - self.failed
    }

    /// Failure rate over the held outcomes, in percent. Zero when empty.
    pub fn failure_rate(&self) -> f64 {
        percentage(self.failed, self.outcomes.len())
    }

    /// Slow-call rate over the held outcomes, in percent. Zero when empty.
    pub fn slow_call_rate(&self) -> f64 {
        percentage(self.slow, self.outcomes.len())
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}
