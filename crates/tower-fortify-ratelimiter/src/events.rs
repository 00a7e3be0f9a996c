use std::time::{Duration, Instant};
use tower_fortify_core::ResilienceEvent;

/// Events emitted by a rate limiter.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A permit was granted, possibly after waiting for a refresh.
    PermitAcquired {
        pattern_name: String,
        timestamp: Instant,
        wait_duration: Duration,
    },
    /// No permit could be granted within the caller's timeout.
    PermitRejected {
        pattern_name: String,
        timestamp: Instant,
        timeout_duration: Duration,
    },
    /// One or more periods elapsed and the permits were reset.
    PermitsRefreshed {
        pattern_name: String,
        timestamp: Instant,
        available_permits: usize,
    },
}

impl ResilienceEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::PermitAcquired { .. } => "permit_acquired",
            RateLimiterEvent::PermitRejected { .. } => "permit_rejected",
            RateLimiterEvent::PermitsRefreshed { .. } => "permits_refreshed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::PermitAcquired { timestamp, .. }
            | RateLimiterEvent::PermitRejected { timestamp, .. }
            | RateLimiterEvent::PermitsRefreshed { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            RateLimiterEvent::PermitAcquired { pattern_name, .. }
            | RateLimiterEvent::PermitRejected { pattern_name, .. }
            | RateLimiterEvent::PermitsRefreshed { pattern_name, .. } => pattern_name,
        }
    }
}
