//! Event types for time limiter.

use std::time::{Duration, Instant};
use tower_fortify_core::ResilienceEvent;

/// Events emitted by the time limiter.
#[derive(Debug, Clone)]
pub enum TimeLimiterEvent {
    /// A call completed successfully within the timeout.
    Success {
        /// The name of the time limiter instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long the call took.
        duration: Duration,
    },
    /// A call failed within the timeout.
    Error {
        /// The name of the time limiter instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// How long before the error occurred.
        duration: Duration,
    },
    /// The deadline elapsed before the call completed.
    Timeout {
        /// The name of the time limiter instance.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The configured timeout duration.
        timeout_duration: Duration,
        /// Whether the running operation was cancelled.
        cancelled: bool,
    },
}

impl ResilienceEvent for TimeLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TimeLimiterEvent::Success { .. } => "success",
            TimeLimiterEvent::Error { .. } => "error",
            TimeLimiterEvent::Timeout { .. } => "timeout",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            TimeLimiterEvent::Success { timestamp, .. }
            | TimeLimiterEvent::Error { timestamp, .. }
            | TimeLimiterEvent::Timeout { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            TimeLimiterEvent::Success { pattern_name, .. }
            | TimeLimiterEvent::Error { pattern_name, .. }
            | TimeLimiterEvent::Timeout { pattern_name, .. } => pattern_name,
        }
    }
}
