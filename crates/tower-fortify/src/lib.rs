//! Composable fault-tolerance policies for Tower services.
//!
//! `tower-fortify` bundles a set of independent policies that decorate an
//! async operation. Each one is available as its own crate and as a feature
//! of this meta-crate.
//!
//! # Policies
//!
//! - **Circuit Breaker** (`circuitbreaker` feature): stops calling a dependency
//!   whose recent failure or slow-call rate crossed a threshold
//! - **Bulkhead** (`bulkhead` feature): bounds concurrent calls, either with a
//!   semaphore or with a bounded worker pool and queue
//! - **Rate Limiter** (`ratelimiter` feature): admits a fixed number of calls
//!   per refresh period
//! - **Retry** (`retry` feature): re-invokes failed operations with fixed,
//!   exponential or randomized backoff
//! - **Time Limiter** (`timelimiter` feature): bounds a call by a deadline and
//!   optionally cancels it
//! - **Fallback** (`fallback` feature): recovers terminal failures with a
//!   handler selected by error kind
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! tower-fortify = { version = "0.3", features = ["full"] }
//! ```
//!
//! Failures from every policy share one type, [`ResilienceError`], so a
//! caller can tell "the policy said no" ([`Rejection`]) apart from "the
//! deadline fired" and "the operation itself failed".
//!
//! # Composing
//!
//! [`Decorators`] lists policies outer to inner and builds a cloneable
//! service. [`PolicyRegistry`] hands out one shared policy instance per type
//! and name, so every caller that names `"backendA"` shares its breaker.
//!
//! ```rust
//! # #[cfg(feature = "full")]
//! # async fn example() {
//! use tower::ServiceExt;
//! use tower_fortify::{Decorators, PolicyRegistry};
//!
//! let registry = PolicyRegistry::new();
//!
//! let service = Decorators::supplier(|| async { Ok::<_, std::io::Error>(42) })
//!     .with_retry(registry.retry("backendA"))
//!     .with_circuit_breaker(registry.circuit_breaker("backendA"))
//!     .with_bulkhead(registry.bulkhead("backendA"))
//!     .build();
//!
//! assert_eq!(service.oneshot(()).await.unwrap(), 42);
//! # }
//! ```

mod decorate;
mod registry;

pub use decorate::{Decorated, Decorators};
pub use registry::PolicyRegistry;

pub use tower_fortify_core as core;
pub use tower_fortify_core::{Classify, ConfigError, ErrorKind, Registry, Rejection, ResilienceError};

#[cfg(feature = "circuitbreaker")]
pub use tower_fortify_circuitbreaker as circuitbreaker;

#[cfg(feature = "bulkhead")]
pub use tower_fortify_bulkhead as bulkhead;

#[cfg(feature = "ratelimiter")]
pub use tower_fortify_ratelimiter as ratelimiter;

#[cfg(feature = "retry")]
pub use tower_fortify_retry as retry;

#[cfg(feature = "timelimiter")]
pub use tower_fortify_timelimiter as timelimiter;

#[cfg(feature = "fallback")]
pub use tower_fortify_fallback as fallback;
