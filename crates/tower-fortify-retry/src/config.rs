use crate::backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
use crate::events::RetryEvent;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tower_fortify_core::{
    ConfigError, ErrorKind, EventListener, EventListeners, FnListener, ResilienceError,
};

type ErrorPredicate<E> = Arc<dyn Fn(&ResilienceError<E>) -> bool + Send + Sync>;
type ResultPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Configuration for the retry pattern.
///
/// `T` is the operation's success type, `E` its error type.
pub struct RetryConfig<T, E> {
    pub(crate) max_attempts: usize,
    pub(crate) interval: Arc<dyn IntervalFunction>,
    pub(crate) retry_on_kinds: Vec<ErrorKind>,
    pub(crate) ignore_kinds: Vec<ErrorKind>,
    pub(crate) retry_on_error: Option<ErrorPredicate<E>>,
    pub(crate) retry_on_result: Option<ResultPredicate<T>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
}

impl<T, E> RetryConfig<T, E> {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder<T, E> {
        RetryConfigBuilder::new()
    }

    /// Upper bound on invocations of the operation, the first one included.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// The pause before retry number `retry` (0-based).
    pub fn interval(&self, retry: usize) -> Duration {
        self.interval.next_interval(retry)
    }

    /// Kinds that are retried. Empty means every kind that is not ignored.
    pub fn retry_on_kinds(&self) -> &[ErrorKind] {
        &self.retry_on_kinds
    }

    /// Kinds that are never retried.
    pub fn ignore_kinds(&self) -> &[ErrorKind] {
        &self.ignore_kinds
    }
}

impl<T, E> Clone for RetryConfig<T, E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            interval: Arc::clone(&self.interval),
            retry_on_kinds: self.retry_on_kinds.clone(),
            ignore_kinds: self.ignore_kinds.clone(),
            retry_on_error: self.retry_on_error.clone(),
            retry_on_result: self.retry_on_result.clone(),
            event_listeners: self.event_listeners.clone(),
        }
    }
}

impl<T, E> Default for RetryConfig<T, E> {
    fn default() -> Self {
        RetryConfigBuilder::new().into_config()
    }
}

impl<T, E> fmt::Debug for RetryConfig<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("retry_on_kinds", &self.retry_on_kinds)
            .field("ignore_kinds", &self.ignore_kinds)
            .field("retry_on_error", &self.retry_on_error.is_some())
            .field("retry_on_result", &self.retry_on_result.is_some())
            .field("event_listeners", &self.event_listeners)
            .finish()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<T, E> {
    max_attempts: usize,
    interval: Arc<dyn IntervalFunction>,
    retry_on_kinds: Vec<ErrorKind>,
    ignore_kinds: Vec<ErrorKind>,
    retry_on_error: Option<ErrorPredicate<E>>,
    retry_on_result: Option<ResultPredicate<T>>,
    event_listeners: EventListeners<RetryEvent>,
}

impl<T, E> Default for RetryConfigBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> RetryConfigBuilder<T, E> {
    /// Creates a new builder with default values.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - interval: fixed 500ms
    /// - every failure is retried
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            interval: Arc::new(FixedInterval::new(Duration::from_millis(500))),
            retry_on_kinds: Vec::new(),
            ignore_kinds: Vec::new(),
            retry_on_error: None,
            retry_on_result: None,
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of attempts, the first call included.
    ///
    /// A value of 1 disables retrying.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Waits the same `duration` before every retry.
    pub fn wait_duration(mut self, duration: Duration) -> Self {
        self.interval = Arc::new(FixedInterval::new(duration));
        self
    }

    /// Uses exponential backoff starting at `initial_interval`, doubling
    /// each time.
    pub fn exponential_backoff(mut self, initial_interval: Duration) -> Self {
        self.interval = Arc::new(ExponentialBackoff::new(initial_interval));
        self
    }

    /// Uses exponential backoff with random jitter.
    pub fn exponential_random_backoff(
        mut self,
        initial_interval: Duration,
        randomization_factor: f64,
    ) -> Self {
        self.interval = Arc::new(ExponentialRandomBackoff::new(
            initial_interval,
            randomization_factor,
        ));
        self
    }

    /// Uses a custom [`IntervalFunction`].
    pub fn interval_function<I>(mut self, interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval = Arc::new(interval);
        self
    }

    /// Computes the pause with a closure of the 0-based retry number.
    pub fn interval_fn<F>(self, f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        self.interval_function(FnInterval::new(f))
    }

    /// Retries failures of `kind` or any of its descendants.
    ///
    /// Once any kind is listed, failures matching none of them are not retried.
    pub fn retry_on_kind(mut self, kind: ErrorKind) -> Self {
        self.retry_on_kinds.push(kind);
        self
    }

    /// Retries failures of any of `kinds`.
    pub fn retry_on_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = ErrorKind>,
    {
        self.retry_on_kinds.extend(kinds);
        self
    }

    /// Never retries failures of `kind` or its descendants.
    ///
    /// Ignored kinds take precedence over retried kinds.
    pub fn ignore_kind(mut self, kind: ErrorKind) -> Self {
        self.ignore_kinds.push(kind);
        self
    }

    /// Never retries failures of any of `kinds`.
    pub fn ignore_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = ErrorKind>,
    {
        self.ignore_kinds.extend(kinds);
        self
    }

    /// Adds a predicate every retryable failure must also satisfy.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tower_fortify_core::ResilienceError;
    /// use tower_fortify_retry::RetryConfig;
    ///
    /// let config = RetryConfig::<String, std::io::Error>::builder()
    ///     .retry_on_error(|err: &ResilienceError<std::io::Error>| {
    ///         err.operation_error()
    ///             .map(|e| e.kind() == std::io::ErrorKind::ConnectionReset)
    ///             .unwrap_or(false)
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn retry_on_error<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&ResilienceError<E>) -> bool + Send + Sync + 'static,
    {
        self.retry_on_error = Some(Arc::new(predicate));
        self
    }

    /// Retries when a successful value satisfies `predicate`.
    ///
    /// If the last attempt still returns such a value, it is handed back
    /// to the caller as `Ok`.
    pub fn retry_on_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.retry_on_result = Some(Arc::new(predicate));
        self
    }

    /// Registers a listener for every retry event.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<RetryEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback before each retry.
    ///
    /// # Callback Signature
    /// `Fn(usize, Duration)` - Called with the number of the attempt that just
    /// failed and the pause before the next one.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback when a call succeeds.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the number of attempts it took.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when a call gives up after exhausting its attempts.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Error { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when a non-retryable failure is passed through.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorKind) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::IgnoredError { kind, .. } = event {
                f(*kind);
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<RetryConfig<T, E>, ConfigError> {
        ConfigError::require_positive("max_attempts", self.max_attempts)?;
        Ok(self.into_config())
    }

    fn into_config(self) -> RetryConfig<T, E> {
        RetryConfig {
            max_attempts: self.max_attempts,
            interval: self.interval,
            retry_on_kinds: self.retry_on_kinds,
            ignore_kinds: self.ignore_kinds,
            retry_on_error: self.retry_on_error,
            retry_on_result: self.retry_on_result,
            event_listeners: self.event_listeners,
        }
    }
}
