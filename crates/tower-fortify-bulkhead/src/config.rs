//! Configuration for the bulkhead pattern.

use crate::events::BulkheadEvent;
use std::time::Duration;
use tokio::runtime::Handle;
use tower_fortify_core::{ConfigError, EventListener, EventListeners, FnListener};

/// Configuration for the semaphore [`Bulkhead`](crate::Bulkhead).
#[derive(Clone, Debug)]
pub struct BulkheadConfig {
    /// Maximum number of concurrent calls allowed.
    pub(crate) max_concurrent_calls: usize,
    /// Maximum time to wait for a permit. Zero means no wait.
    pub(crate) max_wait_duration: Duration,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl BulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BulkheadConfigBuilder {
        BulkheadConfigBuilder::new()
    }

    /// Maximum number of concurrent calls.
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_concurrent_calls
    }

    /// How long a caller waits for a permit by default.
    pub fn max_wait_duration(&self) -> Duration {
        self.max_wait_duration
    }
}

impl Default for BulkheadConfig {
    fn default() -> Self {
        let builder = BulkheadConfigBuilder::new();
        Self {
            max_concurrent_calls: builder.max_concurrent_calls,
            max_wait_duration: builder.max_wait_duration,
            event_listeners: builder.event_listeners,
        }
    }
}

/// Builder for [`BulkheadConfig`].
pub struct BulkheadConfigBuilder {
    max_concurrent_calls: usize,
    max_wait_duration: Duration,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl Default for BulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrent_calls: 25,
            max_wait_duration: Duration::ZERO,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of concurrent calls.
    ///
    /// Default: 25
    pub fn max_concurrent_calls(mut self, max: usize) -> Self {
        self.max_concurrent_calls = max;
        self
    }

    /// Sets the maximum time to wait for a permit.
    ///
    /// A zero duration rejects immediately when every permit is taken.
    /// Default: zero
    pub fn max_wait_duration(mut self, duration: Duration) -> Self {
        self.max_wait_duration = duration;
        self
    }

    /// Registers a listener for every bulkhead event.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<BulkheadEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback when a call is permitted through the bulkhead.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the current number of concurrent calls after this call was permitted.
    /// This value will be between 1 and `max_concurrent_calls` (inclusive).
    ///
    /// # Example
    /// ```rust
    /// use tower_fortify_bulkhead::BulkheadConfig;
    ///
    /// let config = BulkheadConfig::builder()
    ///     .max_concurrent_calls(10)
    ///     .on_call_permitted(|concurrent| {
    ///         if concurrent >= 8 {
    ///             println!("Warning: approaching capacity!");
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls, ..
            } = event
            {
                f(*concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected by the bulkhead.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the configured maximum number of concurrent calls allowed.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected {
                max_concurrent_calls,
                ..
            } = event
            {
                f(*max_concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a permit is released.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - Called with how long the permit was held.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<BulkheadConfig, ConfigError> {
        ConfigError::require_positive("max_concurrent_calls", self.max_concurrent_calls)?;
        Ok(BulkheadConfig {
            max_concurrent_calls: self.max_concurrent_calls,
            max_wait_duration: self.max_wait_duration,
            event_listeners: self.event_listeners,
        })
    }
}

/// Configuration for the [`ThreadPoolBulkhead`](crate::ThreadPoolBulkhead).
#[derive(Clone, Debug)]
pub struct ThreadPoolBulkheadConfig {
    pub(crate) core_threads: usize,
    pub(crate) max_threads: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) handle: Option<Handle>,
    pub(crate) event_listeners: EventListeners<BulkheadEvent>,
}

impl ThreadPoolBulkheadConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ThreadPoolBulkheadConfigBuilder {
        ThreadPoolBulkheadConfigBuilder::new()
    }

    /// Workers started before jobs are queued.
    pub fn core_threads(&self) -> usize {
        self.core_threads
    }

    /// Upper bound on concurrently running jobs.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Upper bound on jobs waiting for a worker.
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

impl Default for ThreadPoolBulkheadConfig {
    fn default() -> Self {
        let builder = ThreadPoolBulkheadConfigBuilder::new();
        Self {
            core_threads: builder.core_threads,
            max_threads: builder.max_threads,
            queue_capacity: builder.queue_capacity,
            handle: builder.handle,
            event_listeners: builder.event_listeners,
        }
    }
}

/// Builder for [`ThreadPoolBulkheadConfig`].
pub struct ThreadPoolBulkheadConfigBuilder {
    core_threads: usize,
    max_threads: usize,
    queue_capacity: usize,
    handle: Option<Handle>,
    event_listeners: EventListeners<BulkheadEvent>,
}

impl Default for ThreadPoolBulkheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadPoolBulkheadConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            core_threads: 1,
            max_threads: parallelism,
            queue_capacity: 100,
            handle: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the number of workers started before jobs are queued.
    ///
    /// Default: 1
    pub fn core_threads(mut self, n: usize) -> Self {
        self.core_threads = n;
        self
    }

    /// Sets the maximum number of concurrently running jobs.
    ///
    /// Default: available parallelism
    pub fn max_threads(mut self, n: usize) -> Self {
        self.max_threads = n;
        self
    }

    /// Sets how many jobs may wait for a worker.
    ///
    /// Default: 100
    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    /// Runs workers on `handle` instead of the caller's runtime.
    pub fn runtime_handle(mut self, handle: Handle) -> Self {
        self.handle = Some(handle);
        self
    }

    /// Registers a listener for every bulkhead event.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<BulkheadEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback when a job starts on a worker.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallPermitted {
                concurrent_calls, ..
            } = event
            {
                f(*concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a job is queued, with the resulting queue depth.
    pub fn on_call_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallQueued { queue_depth, .. } = event {
                f(*queue_depth);
            }
        }));
        self
    }

    /// Registers a callback when a job is rejected.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallRejected {
                max_concurrent_calls,
                ..
            } = event
            {
                f(*max_concurrent_calls);
            }
        }));
        self
    }

    /// Registers a callback when a job completes.
    pub fn on_call_finished<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let BulkheadEvent::CallFinished { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<ThreadPoolBulkheadConfig, ConfigError> {
        ConfigError::require_positive("core_threads", self.core_threads)?;
        ConfigError::require_positive("max_threads", self.max_threads)?;
        if self.core_threads > self.max_threads {
            return Err(ConfigError::new(
                "core_threads",
                format!(
                    "must not exceed max_threads ({} > {})",
                    self.core_threads, self.max_threads
                ),
            ));
        }
        Ok(ThreadPoolBulkheadConfig {
            core_threads: self.core_threads,
            max_threads: self.max_threads,
            queue_capacity: self.queue_capacity,
            handle: self.handle,
            event_listeners: self.event_listeners,
        })
    }
}
