//! Retry policy for Tower services and async operations.
//!
//! A [`Retry`] re-invokes a failed operation up to `max_attempts` times,
//! pausing between attempts according to an [`IntervalFunction`]. Failures are
//! classified through [`Classify`]: ignored kinds are never retried, and when
//! retry kinds are listed only those are. A result predicate can also treat
//! a successful value as a soft failure.
//!
//! ## Basic Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower_fortify_core::{ErrorKind, ResilienceError};
//! use tower_fortify_retry::{Retry, RetryConfig};
//!
//! # async fn example() {
//! let config = RetryConfig::<u32, std::io::Error>::builder()
//!     .max_attempts(3)
//!     .exponential_backoff(Duration::from_millis(100))
//!     .ignore_kind(ErrorKind::new("io.not_found"))
//!     .build()
//!     .unwrap();
//! let retry = Arc::new(Retry::new("backend", config));
//!
//! let value = retry
//!     .execute(|| async { Ok::<_, ResilienceError<std::io::Error>>(42) })
//!     .await;
//! assert_eq!(value.unwrap(), 42);
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: `retry_calls_total` and `retry_attempts_total` counters
//! - `tracing`: retries and exhaustion are logged

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter};
use std::future::Future;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Instant;
use tower_fortify_core::{Classify, ErrorKind, Policy, ResilienceError};

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;
pub use layer::{RetryLayer, RetryService};

mod backoff;
mod config;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A named retry policy for operations yielding `Result<T, ResilienceError<E>>`.
pub struct Retry<T, E> {
    name: String,
    config: RetryConfig<T, E>,
}

impl<T, E> Retry<T, E> {
    /// Creates a retry policy.
    pub fn new(name: impl Into<String>, config: RetryConfig<T, E>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "retry_calls_total",
                "Total number of calls through retry policies, by result"
            );
            describe_counter!(
                "retry_attempts_total",
                "Total number of retries performed"
            );
        });

        Self {
            name: name.into(),
            config,
        }
    }

    /// Creates a retry policy with the default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, RetryConfig::default())
    }

    /// The policy's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The policy's configuration.
    pub fn config(&self) -> &RetryConfig<T, E> {
        &self.config
    }

    /// Runs `operation`, retrying it as configured.
    ///
    /// The operation is invoked at most `max_attempts` times. The pause before
    /// attempt `k` is `interval(k - 2)`. When attempts run out on a failure,
    /// that failure is returned; when they run out on a value rejected by the
    /// result predicate, that value is returned as `Ok`.
    pub async fn execute<F, Fut>(&self, mut operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ResilienceError<E>>>,
        E: Classify,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    let soft_failure = self
                        .config
                        .retry_on_result
                        .as_ref()
                        .is_some_and(|predicate| predicate(&value));
                    if !soft_failure {
                        self.on_success(attempt);
                        return Ok(value);
                    }
                    if attempt >= self.config.max_attempts {
                        self.on_exhausted(attempt);
                        return Ok(value);
                    }
                }
                Err(error) => {
                    let kind = error.kind();
                    if !self.is_retryable(&error, kind) {
                        self.on_ignored(kind);
                        return Err(error);
                    }
                    if attempt >= self.config.max_attempts {
                        self.on_exhausted(attempt);
                        return Err(error);
                    }
                }
            }

            let delay = self.config.interval.next_interval(attempt - 1);
            self.on_retry(attempt, delay);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    fn is_retryable(&self, error: &ResilienceError<E>, kind: ErrorKind) -> bool {
        if kind.is_any_of(&self.config.ignore_kinds) {
            return false;
        }
        if !self.config.retry_on_kinds.is_empty() && !kind.is_any_of(&self.config.retry_on_kinds)
        {
            return false;
        }
        self.config
            .retry_on_error
            .as_ref()
            .map_or(true, |predicate| predicate(error))
    }

    fn on_retry(&self, attempt: usize, delay: std::time::Duration) {
        #[cfg(feature = "tracing")]
        tracing::debug!(retry = %self.name, attempt, ?delay, "attempt failed, retrying");

        #[cfg(feature = "metrics")]
        counter!("retry_attempts_total", "retry" => self.name.clone()).increment(1);

        self.config.event_listeners.emit(&RetryEvent::Retry {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            attempt,
            delay,
        });
    }

    fn on_success(&self, attempts: usize) {
        #[cfg(feature = "metrics")]
        {
            let result = if attempts == 1 {
                "success_without_retry"
            } else {
                "success_with_retry"
            };
            counter!("retry_calls_total", "retry" => self.name.clone(), "result" => result)
                .increment(1);
        }

        self.config.event_listeners.emit(&RetryEvent::Success {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            attempts,
        });
    }

    fn on_exhausted(&self, attempts: usize) {
        #[cfg(feature = "tracing")]
        tracing::warn!(retry = %self.name, attempts, "retry attempts exhausted");

        #[cfg(feature = "metrics")]
        counter!("retry_calls_total", "retry" => self.name.clone(), "result" => "exhausted")
            .increment(1);

        self.config.event_listeners.emit(&RetryEvent::Error {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            attempts,
        });
    }

    fn on_ignored(&self, kind: ErrorKind) {
        #[cfg(feature = "tracing")]
        tracing::debug!(retry = %self.name, kind = kind.as_str(), "failure is not retryable");

        #[cfg(feature = "metrics")]
        counter!("retry_calls_total", "retry" => self.name.clone(), "result" => "ignored")
            .increment(1);

        self.config.event_listeners.emit(&RetryEvent::IgnoredError {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            kind,
        });
    }
}

impl<T, E> std::fmt::Debug for Retry<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retry")
            .field("name", &self.name)
            .field("max_attempts", &self.config.max_attempts)
            .finish()
    }
}

impl<T: 'static, E: 'static> Policy for Retry<T, E> {
    type Config = RetryConfig<T, E>;

    fn from_config(name: &str, config: RetryConfig<T, E>) -> Self {
        Retry::new(name, config)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
