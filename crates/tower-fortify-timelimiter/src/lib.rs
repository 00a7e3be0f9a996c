//! Deadline enforcement for Tower services and async operations.
//!
//! A [`TimeLimiter`] runs each operation as its own tokio task and races it
//! against a timer. Whichever finishes first decides the outcome: either the
//! operation's own result, or [`ResilienceError::CallTimedOut`]. A result that
//! arrives after the deadline is discarded.
//!
//! With `cancel_running_operation` enabled (the default) the task is aborted
//! when the deadline elapses, and also when the caller drops the waiting
//! future. An aborted task is dropped at its next `.await`, so operations must
//! yield to actually stop. With cancellation disabled the task is detached and
//! runs to completion in the background.
//!
//! ## Basic Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::{service_fn, ServiceBuilder};
//! use tower_fortify_core::ResilienceError;
//! use tower_fortify_timelimiter::{TimeLimiter, TimeLimiterConfig, TimeLimiterLayer};
//!
//! let config = TimeLimiterConfig::builder()
//!     .timeout_duration(Duration::from_millis(500))
//!     .on_timeout(|| eprintln!("request timed out"))
//!     .build()
//!     .unwrap();
//! let limiter = Arc::new(TimeLimiter::new("backend", config));
//!
//! let service = ServiceBuilder::new()
//!     .layer(TimeLimiterLayer::new(limiter))
//!     .service(service_fn(|req: String| async move {
//!         Ok::<_, ResilienceError<std::io::Error>>(req)
//!     }));
//! ```
//!
//! ## Feature Flags
//! - `metrics`: `timelimiter_calls_total` counter and call duration histogram
//! - `tracing`: timeouts are logged

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::future::Future;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tower_fortify_core::{Policy, Rejection, ResilienceError};

pub use config::{TimeLimiterConfig, TimeLimiterConfigBuilder};
pub use events::TimeLimiterEvent;
pub use layer::{TimeLimiterLayer, TimeLimiterService};

mod config;
mod events;
mod layer;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A named, shareable deadline policy.
pub struct TimeLimiter {
    name: String,
    config: TimeLimiterConfig,
}

/// Aborts the task on drop while armed.
struct AbortOnDrop<T> {
    handle: JoinHandle<T>,
    armed: bool,
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        if self.armed {
            self.handle.abort();
        }
    }
}

impl TimeLimiter {
    /// Creates a time limiter.
    pub fn new(name: impl Into<String>, config: TimeLimiterConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "timelimiter_calls_total",
                "Total number of time limiter calls (success, error, or timeout)"
            );
            describe_histogram!(
                "timelimiter_call_duration_seconds",
                "Duration of calls that completed before the deadline"
            );
        });

        Self {
            name: name.into(),
            config,
        }
    }

    /// Creates a time limiter with the default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, TimeLimiterConfig::default())
    }

    /// The time limiter's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The time limiter's configuration.
    pub fn config(&self) -> &TimeLimiterConfig {
        &self.config
    }

    /// Runs `operation` against the configured deadline.
    pub async fn execute<F, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        self.execute_with_deadline(operation, self.config.timeout_duration)
            .await
    }

    /// Runs `operation` against an explicit deadline.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn execute_with_deadline<F, T, E>(
        &self,
        operation: F,
        timeout: Duration,
    ) -> Result<T, ResilienceError<E>>
    where
        F: Future<Output = Result<T, ResilienceError<E>>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let start = tokio::time::Instant::now();
        let mut task = AbortOnDrop {
            handle: tokio::spawn(operation),
            armed: self.config.cancel_running_operation,
        };

        match tokio::time::timeout(timeout, &mut task.handle).await {
            Ok(Ok(result)) => {
                self.on_completed(result.is_ok(), start.elapsed());
                result
            }
            Ok(Err(join_error)) => match join_error.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(_) => Err(ResilienceError::CallRejected(Rejection::ShutDown {
                    name: self.name.clone(),
                })),
            },
            Err(_elapsed) => {
                let cancelled = task.armed;
                drop(task);
                self.on_timeout(timeout, cancelled);
                Err(ResilienceError::CallTimedOut {
                    name: self.name.clone(),
                    timeout,
                })
            }
        }
    }

    fn on_completed(&self, success: bool, duration: Duration) {
        let event = if success {
            TimeLimiterEvent::Success {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
                duration,
            }
        } else {
            TimeLimiterEvent::Error {
                pattern_name: self.name.clone(),
                timestamp: Instant::now(),
                duration,
            }
        };

        #[cfg(feature = "metrics")]
        {
            let result = if success { "success" } else { "error" };
            counter!("timelimiter_calls_total", "timelimiter" => self.name.clone(), "result" => result)
                .increment(1);
            histogram!("timelimiter_call_duration_seconds", "timelimiter" => self.name.clone())
                .record(duration.as_secs_f64());
        }

        self.config.event_listeners.emit(&event);
    }

    fn on_timeout(&self, timeout_duration: Duration, cancelled: bool) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            timelimiter = %self.name,
            timeout_ms = timeout_duration.as_millis(),
            cancelled,
            "call timed out"
        );

        #[cfg(feature = "metrics")]
        counter!("timelimiter_calls_total", "timelimiter" => self.name.clone(), "result" => "timeout")
            .increment(1);

        self.config.event_listeners.emit(&TimeLimiterEvent::Timeout {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            timeout_duration,
            cancelled,
        });
    }
}

impl std::fmt::Debug for TimeLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeLimiter")
            .field("name", &self.name)
            .field("timeout_duration", &self.config.timeout_duration)
            .field(
                "cancel_running_operation",
                &self.config.cancel_running_operation,
            )
            .finish()
    }
}

impl Policy for TimeLimiter {
    type Config = TimeLimiterConfig;

    fn from_config(name: &str, config: TimeLimiterConfig) -> Self {
        TimeLimiter::new(name, config)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
