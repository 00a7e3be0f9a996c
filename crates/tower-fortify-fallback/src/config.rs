//! Builder for fallback tables.

use crate::{FallbackEvent, FallbackTable, Handler};
use futures::future::{self, BoxFuture};
use std::future::Future;
use std::sync::Arc;
use tower_fortify_core::{ErrorKind, EventListener, EventListeners, FnListener, ResilienceError};

/// Builder for constructing a [`FallbackTable`].
///
/// Handlers are kept in declaration order. When several handlers match a
/// failure equally well, the one declared first wins.
pub struct FallbackTableBuilder<T, E> {
    name: String,
    entries: Vec<(ErrorKind, Handler<T, E>)>,
    event_listeners: EventListeners<FallbackEvent>,
}

impl<T, E> Default for FallbackTableBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> FallbackTableBuilder<T, E> {
    /// Creates an empty builder named `"fallback"`.
    pub fn new() -> Self {
        Self {
            name: "fallback".to_string(),
            entries: Vec::new(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the name for this fallback table (used in metrics and events).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds an event listener.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<FallbackEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback when a handler is applied.
    ///
    /// # Callback Signature
    /// `Fn(ErrorKind, ErrorKind)` - Called with the handler's declared kind and
    /// the failure's kind.
    pub fn on_applied<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorKind, ErrorKind) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::Applied {
                handler_kind,
                failure_kind,
                ..
            } = event
            {
                f(*handler_kind, *failure_kind);
            }
        }));
        self
    }

    /// Registers a callback when no handler matches a failure.
    pub fn on_unhandled<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorKind) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let FallbackEvent::Unhandled { failure_kind, .. } = event {
                f(*failure_kind);
            }
        }));
        self
    }

    /// Builds the table. It cannot be changed afterwards.
    pub fn build(self) -> FallbackTable<T, E> {
        crate::describe_metrics();
        FallbackTable {
            name: self.name,
            entries: self.entries,
            event_listeners: self.event_listeners,
        }
    }
}

impl<T, E> FallbackTableBuilder<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Handles failures of `kind` (or a descendant) by computing a value from
    /// the failure.
    pub fn on<F>(mut self, kind: ErrorKind, f: F) -> Self
    where
        F: Fn(&ResilienceError<E>) -> T + Send + Sync + 'static,
    {
        let handler: Handler<T, E> = Arc::new(
            move |error: ResilienceError<E>| -> BoxFuture<'static, Result<T, ResilienceError<E>>> {
                let value = f(&error);
                Box::pin(future::ready(Ok(value)))
            },
        );
        self.entries.push((kind, handler));
        self
    }

    /// Handles failures of `kind` (or a descendant) with a fixed value.
    pub fn on_value(self, kind: ErrorKind, value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        self.on(kind, move |_| value.clone())
    }

    /// Handles failures of `kind` (or a descendant) asynchronously.
    ///
    /// The handler receives the failure by value and may itself fail.
    pub fn on_async<F, Fut>(mut self, kind: ErrorKind, f: F) -> Self
    where
        F: Fn(ResilienceError<E>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
    {
        let handler: Handler<T, E> = Arc::new(
            move |error: ResilienceError<E>| -> BoxFuture<'static, Result<T, ResilienceError<E>>> {
                Box::pin(f(error))
            },
        );
        self.entries.push((kind, handler));
        self
    }
}
