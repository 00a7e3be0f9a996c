use crate::CircuitState;
use std::time::{Duration, Instant};
use tower_fortify_core::{ErrorKind, ResilienceEvent};

/// Events emitted by a circuit breaker.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// A permit was granted.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A permit was refused.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// The breaker moved between states.
    StateTransition {
        pattern_name: String,
        timestamp: Instant,
        from_state: CircuitState,
        to_state: CircuitState,
    },
    /// A successful call was recorded.
    SuccessRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
    /// A failed call was recorded.
    ErrorRecorded {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
        kind: ErrorKind,
    },
    /// A failure matched an ignored kind and was left out of the window.
    IgnoredError {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
        kind: ErrorKind,
    },
    /// A recorded call took at least the slow-call threshold.
    SlowCallDetected {
        pattern_name: String,
        timestamp: Instant,
        state: CircuitState,
        duration: Duration,
    },
}

impl ResilienceEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::ErrorRecorded { .. } => "error_recorded",
            CircuitBreakerEvent::IgnoredError { .. } => "ignored_error",
            CircuitBreakerEvent::SlowCallDetected { .. } => "slow_call_detected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::ErrorRecorded { timestamp, .. }
            | CircuitBreakerEvent::IgnoredError { timestamp, .. }
            | CircuitBreakerEvent::SlowCallDetected { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::CallPermitted { pattern_name, .. }
            | CircuitBreakerEvent::CallRejected { pattern_name, .. }
            | CircuitBreakerEvent::StateTransition { pattern_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { pattern_name, .. }
            | CircuitBreakerEvent::ErrorRecorded { pattern_name, .. }
            | CircuitBreakerEvent::IgnoredError { pattern_name, .. }
            | CircuitBreakerEvent::SlowCallDetected { pattern_name, .. } => pattern_name,
        }
    }
}
