use std::time::{Duration, Instant};
use tower_fortify_core::{ErrorKind, ResilienceEvent};

/// Events emitted by a retry policy.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// An attempt failed and another one will follow after `delay`.
    ///
    /// `attempt` is the number of the attempt that just failed, starting at 1.
    Retry {
        pattern_name: String,
        timestamp: Instant,
        attempt: usize,
        delay: Duration,
    },
    /// An attempt succeeded.
    Success {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// The call gave up after `attempts` attempts.
    Error {
        pattern_name: String,
        timestamp: Instant,
        attempts: usize,
    },
    /// A failure that is not retryable was passed through.
    IgnoredError {
        pattern_name: String,
        timestamp: Instant,
        kind: ErrorKind,
    },
}

impl ResilienceEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Error { .. } => "error",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Error { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RetryEvent::Retry { pattern_name, .. }
            | RetryEvent::Success { pattern_name, .. }
            | RetryEvent::Error { pattern_name, .. }
            | RetryEvent::IgnoredError { pattern_name, .. } => pattern_name,
        }
    }
}
