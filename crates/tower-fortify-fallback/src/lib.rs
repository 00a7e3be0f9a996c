//! Kind-based fallback resolution for Tower services.
//!
//! A [`FallbackTable`] maps [`ErrorKind`]s to handlers. When a decorated call
//! ends in a failure, the table picks the handler declared for the most
//! specific ancestor of the failure's kind: the entry with the deepest kind
//! that the failure *is a*. Ties go to the handler declared first. If nothing
//! matches, the failure propagates unchanged.
//!
//! # Basic Example
//!
//! ```rust
//! use tower_fortify_core::{ErrorKind, ResilienceError};
//! use tower_fortify_fallback::FallbackTable;
//!
//! let table = FallbackTable::<String, std::io::Error>::builder()
//!     .on_value(ErrorKind::REJECTED, "busy, try later".to_string())
//!     .on_value(ErrorKind::CIRCUIT_OPEN, "backend unavailable".to_string())
//!     .on(ErrorKind::ANY, |err: &ResilienceError<std::io::Error>| format!("failed: {err}"))
//!     .build();
//!
//! // The circuit-open handler is more specific than the rejection handler.
//! let selected = table.resolve(ErrorKind::CIRCUIT_OPEN).unwrap();
//! assert_eq!(selected.handler_kind, ErrorKind::CIRCUIT_OPEN);
//!
//! // Any other rejection falls back to the shallower entry.
//! let selected = table.resolve(ErrorKind::RATE_LIMITED).unwrap();
//! assert_eq!(selected.handler_kind, ErrorKind::REJECTED);
//! ```
//!
//! # As a Layer
//!
//! ```rust
//! use tower::{service_fn, ServiceBuilder};
//! use tower_fortify_core::{ErrorKind, ResilienceError};
//! use tower_fortify_fallback::{FallbackLayer, FallbackTable};
//!
//! let table = FallbackTable::<String, std::io::Error>::builder()
//!     .on_value(ErrorKind::TIMEOUT, "cached".to_string())
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(FallbackLayer::new(table))
//!     .service(service_fn(|req: String| async move {
//!         Ok::<_, ResilienceError<std::io::Error>>(req)
//!     }));
//! ```
//!
//! # Events
//!
//! - `Applied`: a handler was selected
//! - `Unhandled`: no handler matched and the failure propagated

mod config;
mod events;
mod layer;

pub use config::FallbackTableBuilder;
pub use events::FallbackEvent;
pub use layer::{FallbackLayer, FallbackService};

use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tower_fortify_core::{Classify, ErrorKind, EventListeners, ResilienceError};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

pub(crate) fn describe_metrics() {
    #[cfg(feature = "metrics")]
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "fallback_calls_total",
            "Total number of failures that reached a fallback table, by outcome"
        );
    });
}

/// A type-erased fallback handler.
pub(crate) type Handler<T, E> = Arc<
    dyn Fn(ResilienceError<E>) -> BoxFuture<'static, Result<T, ResilienceError<E>>> + Send + Sync,
>;

/// The handler chosen for a failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// Position of the handler in declaration order.
    pub index: usize,
    /// The kind the handler was declared for.
    pub handler_kind: ErrorKind,
}

/// An immutable, ordered mapping from error kinds to fallback handlers.
pub struct FallbackTable<T, E> {
    pub(crate) name: String,
    pub(crate) entries: Vec<(ErrorKind, Handler<T, E>)>,
    pub(crate) event_listeners: EventListeners<FallbackEvent>,
}

impl<T, E> FallbackTable<T, E> {
    /// Creates a new table builder.
    pub fn builder() -> FallbackTableBuilder<T, E> {
        FallbackTableBuilder::new()
    }

    /// The table's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of declared handlers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no handler is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selects the handler for a failure of `kind`.
    ///
    /// Among the handlers whose declared kind is `kind` or one of its
    /// ancestors, the deepest wins; equal depths go to the first declared.
    pub fn resolve(&self, kind: ErrorKind) -> Option<Resolution> {
        let mut best: Option<Resolution> = None;
        for (index, (handler_kind, _)) in self.entries.iter().enumerate() {
            if !kind.is_a(handler_kind) {
                continue;
            }
            let deeper = best.map_or(true, |b| handler_kind.depth() > b.handler_kind.depth());
            if deeper {
                best = Some(Resolution {
                    index,
                    handler_kind: *handler_kind,
                });
            }
        }
        best
    }

    /// Recovers from `error` with the selected handler, or returns `error`
    /// unchanged if no handler matches.
    pub async fn recover(&self, error: ResilienceError<E>) -> Result<T, ResilienceError<E>>
    where
        E: Classify,
    {
        let failure_kind = error.kind();
        match self.resolve(failure_kind) {
            Some(resolution) => {
                self.on_applied(resolution.handler_kind, failure_kind);
                let handler = Arc::clone(&self.entries[resolution.index].1);
                handler(error).await
            }
            None => {
                self.on_unhandled(failure_kind);
                Err(error)
            }
        }
    }

    fn on_applied(&self, handler_kind: ErrorKind, failure_kind: ErrorKind) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            fallback = %self.name,
            handler = handler_kind.as_str(),
            failure = failure_kind.as_str(),
            "applying fallback"
        );

        #[cfg(feature = "metrics")]
        counter!("fallback_calls_total", "fallback" => self.name.clone(), "result" => "applied")
            .increment(1);

        self.event_listeners.emit(&FallbackEvent::Applied {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            handler_kind,
            failure_kind,
        });
    }

    fn on_unhandled(&self, failure_kind: ErrorKind) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            fallback = %self.name,
            failure = failure_kind.as_str(),
            "no fallback matches, propagating failure"
        );

        #[cfg(feature = "metrics")]
        counter!("fallback_calls_total", "fallback" => self.name.clone(), "result" => "unhandled")
            .increment(1);

        self.event_listeners.emit(&FallbackEvent::Unhandled {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            failure_kind,
        });
    }
}

impl<T, E> fmt::Debug for FallbackTable<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.entries.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("FallbackTable")
            .field("name", &self.name)
            .field("kinds", &kinds)
            .finish()
    }
}
