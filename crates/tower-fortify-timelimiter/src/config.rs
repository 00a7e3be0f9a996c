//! Configuration for time limiter.

use crate::events::TimeLimiterEvent;
use std::time::Duration;
use tower_fortify_core::{ConfigError, EventListener, EventListeners, FnListener};

/// Configuration for the time limiter pattern.
#[derive(Clone, Debug)]
pub struct TimeLimiterConfig {
    pub(crate) timeout_duration: Duration,
    pub(crate) cancel_running_operation: bool,
    pub(crate) event_listeners: EventListeners<TimeLimiterEvent>,
}

impl TimeLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> TimeLimiterConfigBuilder {
        TimeLimiterConfigBuilder::new()
    }

    /// The deadline applied to each call.
    pub fn timeout_duration(&self) -> Duration {
        self.timeout_duration
    }

    /// Whether a timed-out operation is cancelled.
    pub fn cancel_running_operation(&self) -> bool {
        self.cancel_running_operation
    }
}

impl Default for TimeLimiterConfig {
    fn default() -> Self {
        TimeLimiterConfigBuilder::new().into_config()
    }
}

/// Builder for configuring and constructing a time limiter.
pub struct TimeLimiterConfigBuilder {
    timeout_duration: Duration,
    cancel_running_operation: bool,
    event_listeners: EventListeners<TimeLimiterEvent>,
}

impl TimeLimiterConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            timeout_duration: Duration::from_secs(1),
            cancel_running_operation: true,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the timeout duration.
    ///
    /// Default: 1 second
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Sets whether the running operation is cancelled when the deadline
    /// elapses.
    ///
    /// When true, the operation's task is aborted on timeout, and also when the
    /// caller stops waiting. When false, it keeps running in the background
    /// and its result is discarded.
    ///
    /// Default: true
    pub fn cancel_running_operation(mut self, cancel: bool) -> Self {
        self.cancel_running_operation = cancel;
        self
    }

    /// Registers a listener for every time limiter event.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<TimeLimiterEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback to be invoked when a call succeeds within the timeout.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeLimiterEvent::Success { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback to be invoked when a call fails with an error.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let TimeLimiterEvent::Error { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback to be invoked when a call times out.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, TimeLimiterEvent::Timeout { .. }) {
                f();
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<TimeLimiterConfig, ConfigError> {
        ConfigError::require_nonzero_duration("timeout_duration", self.timeout_duration)?;
        Ok(self.into_config())
    }

    fn into_config(self) -> TimeLimiterConfig {
        TimeLimiterConfig {
            timeout_duration: self.timeout_duration,
            cancel_running_operation: self.cancel_running_operation,
            event_listeners: self.event_listeners,
        }
    }
}

impl Default for TimeLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
