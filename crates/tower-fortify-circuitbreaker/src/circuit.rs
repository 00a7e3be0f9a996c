use crate::config::CircuitBreakerConfig;
use crate::events::CircuitBreakerEvent;
use crate::window::{CallOutcome, SlidingWindowMetrics};
use std::time::Duration;
use tokio::time::Instant;
use tower_fortify_core::ErrorKind;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// Calls flow and outcomes are recorded.
    Closed = 0,
    /// Calls are rejected until the open wait elapses.
    Open = 1,
    /// A limited number of probe calls are admitted.
    HalfOpen = 2,
    /// Calls flow and nothing is recorded.
    Disabled = 3,
    /// Calls are rejected until an operator closes the breaker.
    ForcedOpen = 4,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            3 => CircuitState::Disabled,
            4 => CircuitState::ForcedOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Stable lowercase label used in logs and metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
            CircuitState::Disabled => "disabled",
            CircuitState::ForcedOpen => "forced_open",
        }
    }
}

/// Point-in-time view of a circuit breaker's accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerMetrics {
    /// Current state.
    pub state: CircuitState,
    /// Failure rate over the buffered calls, in percent.
    pub failure_rate: f64,
    /// Slow-call rate over the buffered calls, in percent.
    pub slow_call_rate: f64,
    /// Outcomes currently held by the active window.
    pub buffered_calls: usize,
    /// Failures among the buffered calls.
    pub failed_calls: usize,
    /// Slow calls among the buffered calls.
    pub slow_calls: usize,
    /// Calls rejected since the breaker was created.
    pub not_permitted_calls: u64,
    /// Time spent in the current state.
    pub time_in_state: Duration,
}

/// Permission to make one call, granted by
/// [`CircuitBreaker::try_acquire_permission`](crate::CircuitBreaker::try_acquire_permission).
///
/// A permit belongs to the state episode that issued it. Once the breaker
/// changes state, the permit's outcome is dropped and releasing it frees no
/// half-open slot.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "report the outcome with on_success/on_error or hand it back with release_permission"]
pub struct CallPermit {
    generation: u64,
}

impl CallPermit {
    pub(crate) fn new(generation: u64) -> Self {
        Self { generation }
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// How a completed call should be accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Success,
    Failure(ErrorKind),
    Ignored(ErrorKind),
}

/// The breaker's mutable state. Every method runs under the breaker's lock
/// and queues events instead of publishing them.
pub(crate) struct Circuit {
    state: CircuitState,
    entered_at: Instant,
    window: SlidingWindowMetrics,
    probes: SlidingWindowMetrics,
    probe_permits: usize,
    not_permitted: u64,
    /// Bumped on every transition; tags the permits of the current episode.
    generation: u64,
}

impl Circuit {
    pub(crate) fn new(config: &CircuitBreakerConfig, now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            entered_at: now,
            window: SlidingWindowMetrics::new(config.sliding_window_size),
            probes: SlidingWindowMetrics::new(config.permitted_calls_in_half_open),
            probe_permits: 0,
            not_permitted: 0,
            generation: 0,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// Grants a permit tagged with the current generation, or returns the
    /// state that refused it.
    pub(crate) fn try_acquire(
        &mut self,
        name: &str,
        config: &CircuitBreakerConfig,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) -> Result<u64, CircuitState> {
        let permitted = match self.state {
            CircuitState::Closed | CircuitState::Disabled => true,
            CircuitState::ForcedOpen => false,
            CircuitState::Open => {
                if now.saturating_duration_since(self.entered_at) >= config.wait_duration_in_open {
                    self.transition_to(CircuitState::HalfOpen, name, now, events);
                    self.issue_probe(config)
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => self.issue_probe(config),
        };

        if permitted {
            events.push(CircuitBreakerEvent::CallPermitted {
                pattern_name: name.to_string(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            });
        } else {
            self.not_permitted += 1;
            events.push(CircuitBreakerEvent::CallRejected {
                pattern_name: name.to_string(),
                timestamp: std::time::Instant::now(),
                state: self.state,
            });
        }
        if permitted {
            Ok(self.generation)
        } else {
            Err(self.state)
        }
    }

    fn issue_probe(&mut self, config: &CircuitBreakerConfig) -> bool {
        if self.probe_permits < config.permitted_calls_in_half_open {
            self.probe_permits += 1;
            true
        } else {
            false
        }
    }

    /// Returns a permit that will never report an outcome. Only a permit
    /// issued in the current Half-Open episode frees a slot.
    pub(crate) fn release(&mut self, generation: u64) {
        if self.state == CircuitState::HalfOpen && generation == self.generation {
            self.probe_permits = self.probe_permits.saturating_sub(1);
        }
    }

    pub(crate) fn record(
        &mut self,
        verdict: Verdict,
        generation: u64,
        duration: Duration,
        name: &str,
        config: &CircuitBreakerConfig,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        // Outcomes of calls admitted in an earlier episode are dropped.
        if generation != self.generation
            || !matches!(self.state, CircuitState::Closed | CircuitState::HalfOpen)
        {
            return;
        }

        let outcome = match verdict {
            Verdict::Ignored(kind) => {
                events.push(CircuitBreakerEvent::IgnoredError {
                    pattern_name: name.to_string(),
                    timestamp: std::time::Instant::now(),
                    duration,
                    kind,
                });
                self.release(generation);
                return;
            }
            Verdict::Success => {
                CallOutcome::from_call(false, duration, config.slow_call_duration_threshold)
            }
            Verdict::Failure(_) => {
                CallOutcome::from_call(true, duration, config.slow_call_duration_threshold)
            }
        };

        events.push(match verdict {
            Verdict::Failure(kind) => CircuitBreakerEvent::ErrorRecorded {
                pattern_name: name.to_string(),
                timestamp: std::time::Instant::now(),
                state: self.state,
                duration,
                kind,
            },
            _ => CircuitBreakerEvent::SuccessRecorded {
                pattern_name: name.to_string(),
                timestamp: std::time::Instant::now(),
                state: self.state,
                duration,
            },
        });
        if outcome.is_slow() {
            events.push(CircuitBreakerEvent::SlowCallDetected {
                pattern_name: name.to_string(),
                timestamp: std::time::Instant::now(),
                state: self.state,
                duration,
            });
        }

        match self.state {
            CircuitState::Closed => {
                self.window.record(outcome);
                if self.window.is_full() && exceeds_thresholds(&self.window, config) {
                    self.transition_to(CircuitState::Open, name, now, events);
                }
            }
            CircuitState::HalfOpen => {
                self.probes.record(outcome);
                if self.probes.is_full() {
                    let next = if exceeds_thresholds(&self.probes, config) {
                        CircuitState::Open
                    } else {
                        CircuitState::Closed
                    };
                    self.transition_to(next, name, now, events);
                }
            }
            _ => {}
        }
    }

    /// Moves to `to`, resetting the accounting that belongs to the new state.
    ///
    /// A transition to the current state still resets its accounting and
    /// restarts its timer, but emits no event.
    pub(crate) fn transition_to(
        &mut self,
        to: CircuitState,
        name: &str,
        now: Instant,
        events: &mut Vec<CircuitBreakerEvent>,
    ) {
        let from = self.state;
        self.state = to;
        self.entered_at = now;
        self.generation = self.generation.wrapping_add(1);
        match to {
            CircuitState::Closed | CircuitState::Disabled | CircuitState::ForcedOpen => {
                self.window.reset();
            }
            CircuitState::HalfOpen => {
                self.probes.reset();
                self.probe_permits = 0;
            }
            CircuitState::Open => {}
        }

        if from != to {
            events.push(CircuitBreakerEvent::StateTransition {
                pattern_name: name.to_string(),
                timestamp: std::time::Instant::now(),
                from_state: from,
                to_state: to,
            });
        }
    }

    pub(crate) fn metrics(&self, now: Instant) -> CircuitBreakerMetrics {
        let window = if self.state == CircuitState::HalfOpen {
            &self.probes
        } else {
            &self.window
        };
        CircuitBreakerMetrics {
            state: self.state,
            failure_rate: window.failure_rate(),
            slow_call_rate: window.slow_call_rate(),
            buffered_calls: window.len(),
            failed_calls: window.failed_calls(),
            slow_calls: window.slow_calls(),
            not_permitted_calls: self.not_permitted,
            time_in_state: now.saturating_duration_since(self.entered_at),
        }
    }
}

fn exceeds_thresholds(window: &SlidingWindowMetrics, config: &CircuitBreakerConfig) -> bool {
    window.failure_rate() >= config.failure_rate_threshold
        || window.slow_call_rate() >= config.slow_call_rate_threshold
}
