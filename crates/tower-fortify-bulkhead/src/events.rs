//! Events emitted by bulkheads.

use std::time::{Duration, Instant};
use tower_fortify_core::ResilienceEvent;

/// Events emitted by a [`Bulkhead`](crate::Bulkhead) or a
/// [`ThreadPoolBulkhead`](crate::ThreadPoolBulkhead).
#[derive(Debug, Clone)]
pub enum BulkheadEvent {
    /// A call was admitted and started.
    CallPermitted {
        pattern_name: String,
        timestamp: Instant,
        concurrent_calls: usize,
    },
    /// A call was placed in the pool queue.
    CallQueued {
        pattern_name: String,
        timestamp: Instant,
        queue_depth: usize,
    },
    /// A call was refused because the bulkhead is saturated.
    CallRejected {
        pattern_name: String,
        timestamp: Instant,
        max_concurrent_calls: usize,
    },
    /// An admitted call released its slot.
    CallFinished {
        pattern_name: String,
        timestamp: Instant,
        duration: Duration,
    },
}

impl ResilienceEvent for BulkheadEvent {
    fn event_type(&self) -> &'static str {
        match self {
            BulkheadEvent::CallPermitted { .. } => "call_permitted",
            BulkheadEvent::CallQueued { .. } => "call_queued",
            BulkheadEvent::CallRejected { .. } => "call_rejected",
            BulkheadEvent::CallFinished { .. } => "call_finished",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            BulkheadEvent::CallPermitted { timestamp, .. }
            | BulkheadEvent::CallQueued { timestamp, .. }
            | BulkheadEvent::CallRejected { timestamp, .. }
            | BulkheadEvent::CallFinished { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            BulkheadEvent::CallPermitted { pattern_name, .. }
            | BulkheadEvent::CallQueued { pattern_name, .. }
            | BulkheadEvent::CallRejected { pattern_name, .. }
            | BulkheadEvent::CallFinished { pattern_name, .. } => pattern_name,
        }
    }
}
