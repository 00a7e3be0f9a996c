//! Events emitted by the fallback service.

use std::time::Instant;
use tower_fortify_core::{ErrorKind, ResilienceEvent};

/// Events emitted when a failure reaches a fallback table.
#[derive(Debug, Clone)]
pub enum FallbackEvent {
    /// A handler was selected for the failure.
    Applied {
        /// Name of the fallback table.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The kind the selected handler was declared for.
        handler_kind: ErrorKind,
        /// The kind of the failure.
        failure_kind: ErrorKind,
    },

    /// No handler matched; the failure propagates unchanged.
    Unhandled {
        /// Name of the fallback table.
        pattern_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The kind of the failure.
        failure_kind: ErrorKind,
    },
}

impl ResilienceEvent for FallbackEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Unhandled { .. } => "unhandled",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::Applied { timestamp, .. } | Self::Unhandled { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            Self::Applied { pattern_name, .. } | Self::Unhandled { pattern_name, .. } => {
                pattern_name
            }
        }
    }
}
