//! Event system shared by every policy.
//!
//! Each admission decision, recorded outcome and state change is published
//! as a typed event to the listeners registered on the policy's config.

use std::fmt;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

/// An event published by a policy instance.
pub trait ResilienceEvent: Send + Sync + fmt::Debug {
    /// Short machine-readable tag, e.g. `"state_transition"`.
    fn event_type(&self) -> &'static str;

    /// When the event was created.
    fn timestamp(&self) -> Instant;

    /// Name of the policy instance that published the event.
    fn pattern_name(&self) -> &str;
}

/// Receives events of type `E`.
pub trait EventListener<E: ResilienceEvent>: Send + Sync {
    /// Called synchronously for each published event.
    fn on_event(&self, event: &E);
}

/// Shared, type-erased listener.
pub type BoxedEventListener<E> = Arc<dyn EventListener<E>>;

/// An ordered set of listeners for one event type.
///
/// Cloning is cheap: clones share the listener objects.
pub struct EventListeners<E: ResilienceEvent> {
    listeners: Vec<BoxedEventListener<E>>,
}

impl<E: ResilienceEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            listeners: self.listeners.clone(),
        }
    }
}

impl<E: ResilienceEvent> EventListeners<E> {
    /// Creates an empty listener set.
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    /// Appends a listener.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Appends an already shared listener.
    pub fn add_shared(&mut self, listener: BoxedEventListener<E>) {
        self.listeners.push(listener);
    }

    /// Publishes `event` to every listener in registration order.
    ///
    /// A panicking listener is skipped; the remaining listeners still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_event(event)));
            if outcome.is_err() {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    pattern = event.pattern_name(),
                    event = event.event_type(),
                    "event listener panicked"
                );
            }
        }
    }

    /// Returns true if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: ResilienceEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ResilienceEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventListeners")
            .field("len", &self.listeners.len())
            .finish()
    }
}

/// Adapts a closure into an [`EventListener`].
pub struct FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    f: F,
    _event: PhantomData<fn(&E)>,
}

impl<E, F> FnListener<E, F>
where
    F: Fn(&E) + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self {
            f,
            _event: PhantomData,
        }
    }
}

impl<E, F> EventListener<E> for FnListener<E, F>
where
    E: ResilienceEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}
