//! Error taxonomy shared by every policy.
//!
//! A decorated call fails in exactly one of three ways:
//!
//! - [`ResilienceError::CallRejected`]: an admission layer (circuit breaker,
//!   bulkhead, rate limiter) refused the call. The protected operation never
//!   ran. The [`Rejection`] says which layer refused and why.
//! - [`ResilienceError::CallTimedOut`]: a time limiter gave up waiting.
//! - [`ResilienceError::OperationFailed`]: the protected operation itself
//!   returned an error, carried through unchanged.
//!
//! Invalid configuration is reported separately, at construction time, as a
//! [`ConfigError`].
//!
//! # Pattern Matching
//!
//! ```rust
//! use tower_fortify_core::{Rejection, ResilienceError};
//!
//! # #[derive(Debug)]
//! # struct AppError;
//! fn describe(error: &ResilienceError<AppError>) -> String {
//!     match error {
//!         ResilienceError::CallRejected(Rejection::CircuitOpen { name, .. }) => {
//!             format!("breaker {name} is open")
//!         }
//!         ResilienceError::CallRejected(other) => format!("rejected: {other}"),
//!         ResilienceError::CallTimedOut { name, timeout } => {
//!             format!("{name} gave up after {timeout:?}")
//!         }
//!         ResilienceError::OperationFailed(app) => format!("operation failed: {app:?}"),
//!     }
//! }
//! ```

use crate::kind::{Classify, ErrorKind};
use std::fmt;
use std::time::Duration;

/// Why an admission layer refused a call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// The circuit breaker is open (or was forced open).
    #[error("circuit breaker '{name}' is {} and does not permit further calls", open_label(.forced))]
    CircuitOpen {
        /// Circuit breaker name.
        name: String,
        /// True when the breaker was forced open by an operator.
        forced: bool,
    },

    /// Every bulkhead permit (or pool slot and queue slot) is taken.
    #[error("bulkhead '{name}' is full and does not permit further calls (max {max_concurrent_calls})")]
    BulkheadFull {
        /// Bulkhead name.
        name: String,
        /// Configured concurrency limit.
        max_concurrent_calls: usize,
    },

    /// No rate limiter permit became available within the timeout.
    #[error("rate limiter '{name}' does not permit further calls within {timeout:?}")]
    RateLimited {
        /// Rate limiter name.
        name: String,
        /// How long the caller was prepared to wait.
        timeout: Duration,
    },

    /// The task running the call was dropped before it produced a result.
    ///
    /// Raised by a pool bulkhead that discards a queued job and by a time
    /// limiter whose spawned task is aborted from outside.
    #[error("'{name}' dropped the call before it completed")]
    ShutDown {
        /// Name of the pool bulkhead or time limiter.
        name: String,
    },
}

fn open_label(forced: &bool) -> &'static str {
    if *forced {
        "forced open"
    } else {
        "open"
    }
}

impl Rejection {
    /// Name of the policy instance that refused the call.
    pub fn policy_name(&self) -> &str {
        match self {
            Rejection::CircuitOpen { name, .. }
            | Rejection::BulkheadFull { name, .. }
            | Rejection::RateLimited { name, .. }
            | Rejection::ShutDown { name } => name,
        }
    }
}

impl Classify for Rejection {
    fn kind(&self) -> ErrorKind {
        match self {
            Rejection::CircuitOpen { .. } => ErrorKind::CIRCUIT_OPEN,
            Rejection::BulkheadFull { .. } => ErrorKind::BULKHEAD_FULL,
            Rejection::RateLimited { .. } => ErrorKind::RATE_LIMITED,
            Rejection::ShutDown { .. } => ErrorKind::SHUT_DOWN,
        }
    }
}

/// The outcome of a failed decorated call.
///
/// `E` is the error type of the protected operation.
#[derive(Debug, Clone, PartialEq)]
pub enum ResilienceError<E> {
    /// An admission layer refused the call; the operation never ran.
    CallRejected(Rejection),

    /// A time limiter stopped waiting for the operation.
    CallTimedOut {
        /// Time limiter name.
        name: String,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The protected operation failed.
    OperationFailed(E),
}

impl<E> fmt::Display for ResilienceError<E>
where
    E: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResilienceError::CallRejected(rejection) => write!(f, "call rejected: {}", rejection),
            ResilienceError::CallTimedOut { name, timeout } => {
                write!(f, "time limiter '{}' timed out after {:?}", name, timeout)
            }
            ResilienceError::OperationFailed(e) => write!(f, "operation failed: {}", e),
        }
    }
}

impl<E> std::error::Error for ResilienceError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResilienceError::CallRejected(rejection) => Some(rejection),
            ResilienceError::CallTimedOut { .. } => None,
            ResilienceError::OperationFailed(e) => Some(e),
        }
    }
}

impl<E> From<Rejection> for ResilienceError<E> {
    fn from(rejection: Rejection) -> Self {
        ResilienceError::CallRejected(rejection)
    }
}

impl<E> ResilienceError<E> {
    /// Returns `true` if an admission layer refused the call.
    pub fn is_rejected(&self) -> bool {
        matches!(self, ResilienceError::CallRejected(_))
    }

    /// Returns `true` if a time limiter gave up on the call.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ResilienceError::CallTimedOut { .. })
    }

    /// Returns `true` if the protected operation itself failed.
    pub fn is_operation_failure(&self) -> bool {
        matches!(self, ResilienceError::OperationFailed(_))
    }

    /// The rejection, if this is a `CallRejected`.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ResilienceError::CallRejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// Borrows the operation error, if this is an `OperationFailed`.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            ResilienceError::OperationFailed(e) => Some(e),
            _ => None,
        }
    }

    /// Extracts the operation error, if this is an `OperationFailed`.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ResilienceError::OperationFailed(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the operation error, leaving rejections and timeouts untouched.
    ///
    /// ```
    /// use tower_fortify_core::ResilienceError;
    ///
    /// let err: ResilienceError<String> = ResilienceError::OperationFailed("boom".to_string());
    /// let mapped: ResilienceError<usize> = err.map_operation(|s| s.len());
    /// assert_eq!(mapped.into_operation_error(), Some(4));
    /// ```
    pub fn map_operation<F, T>(self, f: F) -> ResilienceError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ResilienceError::CallRejected(rejection) => ResilienceError::CallRejected(rejection),
            ResilienceError::CallTimedOut { name, timeout } => {
                ResilienceError::CallTimedOut { name, timeout }
            }
            ResilienceError::OperationFailed(e) => ResilienceError::OperationFailed(f(e)),
        }
    }
}

impl<E: Classify> ResilienceError<E> {
    /// The kind used by circuit breakers, retries and fallbacks to classify
    /// this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ResilienceError::CallRejected(rejection) => rejection.kind(),
            ResilienceError::CallTimedOut { .. } => ErrorKind::TIMEOUT,
            ResilienceError::OperationFailed(e) => e.kind(),
        }
    }
}

impl<E: Classify> Classify for ResilienceError<E> {
    fn kind(&self) -> ErrorKind {
        ResilienceError::kind(self)
    }
}

/// A configuration value was rejected at construction time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration for `{field}`: {reason}")]
pub struct ConfigError {
    /// The offending setting.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }

    /// Fails with `field` unless `value` is non-zero.
    pub fn require_positive(field: &'static str, value: usize) -> Result<(), ConfigError> {
        if value == 0 {
            Err(ConfigError::new(field, "must be greater than zero"))
        } else {
            Ok(())
        }
    }

    /// Fails with `field` unless `value` is a percentage in `(0, 100]`.
    pub fn require_percentage(field: &'static str, value: f64) -> Result<(), ConfigError> {
        if value > 0.0 && value <= 100.0 {
            Ok(())
        } else {
            Err(ConfigError::new(
                field,
                format!("must be within (0, 100], got {}", value),
            ))
        }
    }

    /// Fails with `field` unless `value` is non-zero.
    pub fn require_nonzero_duration(field: &'static str, value: Duration) -> Result<(), ConfigError> {
        if value.is_zero() {
            Err(ConfigError::new(field, "must be a non-zero duration"))
        } else {
            Ok(())
        }
    }
}
