//! An explicit registry of every policy type.
//!
//! [`PolicyRegistry`] is owned by the composition root and passed to whatever
//! builds decorated operations. It holds one [`Registry`] per policy type, so a
//! circuit breaker and a bulkhead may share a name without colliding, while
//! two lookups of the same policy type and name always yield the same
//! instance.

#[cfg(feature = "retry")]
use parking_lot::RwLock;
#[cfg(feature = "retry")]
use std::any::{Any, TypeId};
#[cfg(feature = "retry")]
use std::collections::HashMap;
#[cfg(any(
    feature = "bulkhead",
    feature = "circuitbreaker",
    feature = "ratelimiter",
    feature = "retry",
    feature = "timelimiter"
))]
use std::sync::Arc;
#[cfg(any(
    feature = "bulkhead",
    feature = "circuitbreaker",
    feature = "ratelimiter",
    feature = "retry",
    feature = "timelimiter"
))]
use tower_fortify_core::Registry;

#[cfg(feature = "bulkhead")]
use tower_fortify_bulkhead::{
    Bulkhead, BulkheadConfig, ThreadPoolBulkhead, ThreadPoolBulkheadConfig,
};
#[cfg(feature = "circuitbreaker")]
use tower_fortify_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig};
#[cfg(feature = "ratelimiter")]
use tower_fortify_ratelimiter::{RateLimiter, RateLimiterConfig};
#[cfg(feature = "retry")]
use tower_fortify_retry::{Retry, RetryConfig};
#[cfg(feature = "timelimiter")]
use tower_fortify_timelimiter::{TimeLimiter, TimeLimiterConfig};

/// One name-keyed registry per policy type.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "full")]
/// # {
/// use std::sync::Arc;
/// use tower_fortify::PolicyRegistry;
///
/// let registry = PolicyRegistry::new();
/// let a = registry.circuit_breaker("backendA");
/// let b = registry.circuit_breaker("backendA");
/// assert!(Arc::ptr_eq(&a, &b));
///
/// let retry = registry.retry::<String, std::io::Error>("backendA");
/// assert_eq!(retry.config().max_attempts(), 3);
/// # }
/// ```
#[derive(Default)]
pub struct PolicyRegistry {
    #[cfg(feature = "circuitbreaker")]
    circuit_breakers: Registry<CircuitBreaker>,
    #[cfg(feature = "bulkhead")]
    bulkheads: Registry<Bulkhead>,
    #[cfg(feature = "bulkhead")]
    thread_pool_bulkheads: Registry<ThreadPoolBulkhead>,
    #[cfg(feature = "ratelimiter")]
    rate_limiters: Registry<RateLimiter>,
    #[cfg(feature = "timelimiter")]
    time_limiters: Registry<TimeLimiter>,
    #[cfg(feature = "retry")]
    retries: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl PolicyRegistry {
    /// Creates a registry using each policy's default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `config` for circuit breakers created without an explicit one.
    #[cfg(feature = "circuitbreaker")]
    pub fn with_circuit_breaker_defaults(mut self, config: CircuitBreakerConfig) -> Self {
        self.circuit_breakers = Registry::new(config);
        self
    }

    /// Uses `config` for bulkheads created without an explicit one.
    #[cfg(feature = "bulkhead")]
    pub fn with_bulkhead_defaults(mut self, config: BulkheadConfig) -> Self {
        self.bulkheads = Registry::new(config);
        self
    }

    /// Uses `config` for pool bulkheads created without an explicit one.
    #[cfg(feature = "bulkhead")]
    pub fn with_thread_pool_bulkhead_defaults(mut self, config: ThreadPoolBulkheadConfig) -> Self {
        self.thread_pool_bulkheads = Registry::new(config);
        self
    }

    /// Uses `config` for rate limiters created without an explicit one.
    #[cfg(feature = "ratelimiter")]
    pub fn with_rate_limiter_defaults(mut self, config: RateLimiterConfig) -> Self {
        self.rate_limiters = Registry::new(config);
        self
    }

    /// Uses `config` for time limiters created without an explicit one.
    #[cfg(feature = "timelimiter")]
    pub fn with_time_limiter_defaults(mut self, config: TimeLimiterConfig) -> Self {
        self.time_limiters = Registry::new(config);
        self
    }

    /// Uses `config` for retries over `Result<T, ResilienceError<E>>`
    /// created without an explicit one.
    #[cfg(feature = "retry")]
    pub fn with_retry_defaults<T, E>(self, config: RetryConfig<T, E>) -> Self
    where
        T: 'static,
        E: 'static,
    {
        self.retries.write().insert(
            TypeId::of::<Retry<T, E>>(),
            Arc::new(Registry::<Retry<T, E>>::new(config)),
        );
        self
    }

    /// The circuit breaker registry.
    #[cfg(feature = "circuitbreaker")]
    pub fn circuit_breakers(&self) -> &Registry<CircuitBreaker> {
        &self.circuit_breakers
    }

    /// The shared circuit breaker named `name`, created on first use.
    #[cfg(feature = "circuitbreaker")]
    pub fn circuit_breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        self.circuit_breakers.get_or_create(name)
    }

    /// The semaphore bulkhead registry.
    #[cfg(feature = "bulkhead")]
    pub fn bulkheads(&self) -> &Registry<Bulkhead> {
        &self.bulkheads
    }

    /// The shared bulkhead named `name`, created on first use.
    #[cfg(feature = "bulkhead")]
    pub fn bulkhead(&self, name: &str) -> Arc<Bulkhead> {
        self.bulkheads.get_or_create(name)
    }

    /// The pool bulkhead registry.
    #[cfg(feature = "bulkhead")]
    pub fn thread_pool_bulkheads(&self) -> &Registry<ThreadPoolBulkhead> {
        &self.thread_pool_bulkheads
    }

    /// The shared pool bulkhead named `name`, created on first use.
    #[cfg(feature = "bulkhead")]
    pub fn thread_pool_bulkhead(&self, name: &str) -> Arc<ThreadPoolBulkhead> {
        self.thread_pool_bulkheads.get_or_create(name)
    }

    /// The rate limiter registry.
    #[cfg(feature = "ratelimiter")]
    pub fn rate_limiters(&self) -> &Registry<RateLimiter> {
        &self.rate_limiters
    }

    /// The shared rate limiter named `name`, created on first use.
    #[cfg(feature = "ratelimiter")]
    pub fn rate_limiter(&self, name: &str) -> Arc<RateLimiter> {
        self.rate_limiters.get_or_create(name)
    }

    /// The time limiter registry.
    #[cfg(feature = "timelimiter")]
    pub fn time_limiters(&self) -> &Registry<TimeLimiter> {
        &self.time_limiters
    }

    /// The shared time limiter named `name`, created on first use.
    #[cfg(feature = "timelimiter")]
    pub fn time_limiter(&self, name: &str) -> Arc<TimeLimiter> {
        self.time_limiters.get_or_create(name)
    }

    /// The retry registry for operations yielding `Result<T, ResilienceError<E>>`.
    ///
    /// Created with the default retry configuration on first use.
    #[cfg(feature = "retry")]
    pub fn retries<T, E>(&self) -> Arc<Registry<Retry<T, E>>>
    where
        T: 'static,
        E: 'static,
    {
        let key = TypeId::of::<Retry<T, E>>();
        if let Some(registry) = self.lookup_retries::<T, E>(key) {
            return registry;
        }

        let mut retries = self.retries.write();
        let entry = retries
            .entry(key)
            .or_insert_with(|| Arc::new(Registry::<Retry<T, E>>::new(RetryConfig::default())));
        match Arc::clone(entry).downcast::<Registry<Retry<T, E>>>() {
            Ok(registry) => registry,
            Err(_) => unreachable!("retry registries are keyed by their own TypeId"),
        }
    }

    /// The shared retry named `name` for `Result<T, ResilienceError<E>>`,
    /// created on first use.
    #[cfg(feature = "retry")]
    pub fn retry<T, E>(&self, name: &str) -> Arc<Retry<T, E>>
    where
        T: 'static,
        E: 'static,
    {
        self.retries::<T, E>().get_or_create(name)
    }

    #[cfg(feature = "retry")]
    fn lookup_retries<T: 'static, E: 'static>(
        &self,
        key: TypeId,
    ) -> Option<Arc<Registry<Retry<T, E>>>> {
        let retries = self.retries.read();
        retries
            .get(&key)
            .and_then(|entry| Arc::clone(entry).downcast::<Registry<Retry<T, E>>>().ok())
    }
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("PolicyRegistry");
        #[cfg(feature = "circuitbreaker")]
        s.field("circuit_breakers", &self.circuit_breakers.names());
        #[cfg(feature = "bulkhead")]
        s.field("bulkheads", &self.bulkheads.names());
        #[cfg(feature = "bulkhead")]
        s.field("thread_pool_bulkheads", &self.thread_pool_bulkheads.names());
        #[cfg(feature = "ratelimiter")]
        s.field("rate_limiters", &self.rate_limiters.names());
        #[cfg(feature = "timelimiter")]
        s.field("time_limiters", &self.time_limiters.names());
        #[cfg(feature = "retry")]
        s.field("retry_types", &self.retries.read().len());
        s.finish()
    }
}


#[cfg(all(
    test,
    not(any(
        feature = "bulkhead",
        feature = "circuitbreaker",
        feature = "ratelimiter",
        feature = "retry",
        feature = "timelimiter"
    ))
))]
mod without_policies {
    use super::*;

    #[test]
    fn registry_builds_with_no_policy_enabled() {
        let registry = PolicyRegistry::new();
        assert_eq!(format!("{registry:?}"), "PolicyRegistry");
    }
}
