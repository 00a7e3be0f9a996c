//! Explicit, ordered composition of policies around an operation.

use std::future::Future;
#[cfg(any(
    feature = "bulkhead",
    feature = "circuitbreaker",
    feature = "ratelimiter",
    feature = "retry",
    feature = "timelimiter"
))]
use std::sync::Arc;
use tower::util::BoxCloneService;
use tower::{Layer, Service, ServiceExt};
use tower_fortify_core::{Classify, ResilienceError};

#[cfg(feature = "bulkhead")]
use tower_fortify_bulkhead::{Bulkhead, BulkheadLayer, ThreadPoolBulkhead, ThreadPoolBulkheadLayer};
#[cfg(feature = "circuitbreaker")]
use tower_fortify_circuitbreaker::{CircuitBreaker, CircuitBreakerLayer};
#[cfg(feature = "fallback")]
use tower_fortify_fallback::{FallbackLayer, FallbackTable};
#[cfg(feature = "ratelimiter")]
use tower_fortify_ratelimiter::{RateLimiter, RateLimiterLayer};
#[cfg(feature = "retry")]
use tower_fortify_retry::{Retry, RetryLayer};
#[cfg(feature = "timelimiter")]
use tower_fortify_timelimiter::{TimeLimiter, TimeLimiterLayer};

/// The service type every decoration step consumes and produces.
pub type Decorated<Req, T, E> = BoxCloneService<Req, T, ResilienceError<E>>;

type Step<Req, T, E> = Box<dyn FnOnce(Decorated<Req, T, E>) -> Decorated<Req, T, E>>;

/// Builds a decorated operation from an explicit list of policies.
///
/// Policies are listed outer to inner, like layers in a
/// [`tower::ServiceBuilder`]: the first one listed sees the call first and
/// the last one listed wraps the raw operation. A fallback table, if any, is
/// always applied outside every policy.
///
/// # Example
///
/// ```rust
/// # #[cfg(feature = "full")]
/// # async fn example() {
/// use std::sync::Arc;
/// use tower::ServiceExt;
/// use tower_fortify::circuitbreaker::CircuitBreaker;
/// use tower_fortify::fallback::FallbackTable;
/// use tower_fortify::retry::{Retry, RetryConfig};
/// use tower_fortify::{Decorators, ErrorKind};
///
/// let breaker = Arc::new(CircuitBreaker::with_defaults("backendA"));
/// let retry = Arc::new(Retry::new("backendA", RetryConfig::default()));
///
/// let service = Decorators::supplier(|| async { Ok::<_, std::io::Error>("hello".to_string()) })
///     .with_retry(retry)
///     .with_circuit_breaker(breaker)
///     .with_fallback(
///         FallbackTable::builder()
///             .on_value(ErrorKind::CIRCUIT_OPEN, "recovered".to_string())
///             .build(),
///     )
///     .build();
///
/// assert_eq!(service.oneshot(()).await.unwrap(), "hello");
/// # }
/// ```
pub struct Decorators<Req, T, E> {
    operation: Decorated<Req, T, E>,
    steps: Vec<Step<Req, T, E>>,
    #[cfg(feature = "fallback")]
    fallback: Option<FallbackTable<T, E>>,
}

impl<Req, T, E> Decorators<Req, T, E>
where
    Req: Send + 'static,
    T: Send + 'static,
    E: Classify + Send + 'static,
{
    /// Starts from a service whose errors are raw operation errors.
    ///
    /// Its failures surface as [`ResilienceError::OperationFailed`].
    pub fn of<S>(service: S) -> Self
    where
        S: Service<Req, Response = T, Error = E> + Clone + Send + 'static,
        S::Future: Send + 'static,
    {
        Self {
            operation: BoxCloneService::new(service.map_err(ResilienceError::OperationFailed)),
            steps: Vec::new(),
            #[cfg(feature = "fallback")]
            fallback: None,
        }
    }

    /// Starts from an async function of the request.
    pub fn of_fn<F, Fut>(f: F) -> Self
    where
        F: FnMut(Req) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::of(tower::service_fn(f))
    }

    /// Adds an arbitrary Tower layer as the next, more inner, step.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<Decorated<Req, T, E>> + 'static,
        L::Service: Service<Req, Response = T, Error = ResilienceError<E>> + Clone + Send + 'static,
        <L::Service as Service<Req>>::Future: Send + 'static,
    {
        self.steps
            .push(Box::new(move |inner| BoxCloneService::new(layer.layer(inner))));
        self
    }

    /// Gates calls through `breaker`.
    #[cfg(feature = "circuitbreaker")]
    pub fn with_circuit_breaker(self, breaker: Arc<CircuitBreaker>) -> Self {
        self.layer(CircuitBreakerLayer::new(breaker))
    }

    /// Bounds concurrent calls through `bulkhead`.
    #[cfg(feature = "bulkhead")]
    pub fn with_bulkhead(self, bulkhead: Arc<Bulkhead>) -> Self {
        self.layer(BulkheadLayer::new(bulkhead))
    }

    /// Runs calls on `pool`'s bounded workers.
    #[cfg(feature = "bulkhead")]
    pub fn with_thread_pool_bulkhead(self, pool: Arc<ThreadPoolBulkhead>) -> Self {
        self.layer(ThreadPoolBulkheadLayer::new(pool))
    }

    /// Admits calls through `limiter`.
    #[cfg(feature = "ratelimiter")]
    pub fn with_rate_limiter(self, limiter: Arc<RateLimiter>) -> Self {
        self.layer(RateLimiterLayer::new(limiter))
    }

    /// Bounds calls by `limiter`'s deadline.
    #[cfg(feature = "timelimiter")]
    pub fn with_time_limiter(self, limiter: Arc<TimeLimiter>) -> Self {
        self.layer(TimeLimiterLayer::new(limiter))
    }

    /// Retries failed calls through `retry`.
    #[cfg(feature = "retry")]
    pub fn with_retry(self, retry: Arc<Retry<T, E>>) -> Self
    where
        Req: Clone,
    {
        self.layer(RetryLayer::new(retry))
    }

    /// Recovers terminal failures through `table`.
    ///
    /// The table is applied outside every policy regardless of where this
    /// call appears. A second call replaces the first table.
    #[cfg(feature = "fallback")]
    pub fn with_fallback(mut self, table: FallbackTable<T, E>) -> Self {
        self.fallback = Some(table);
        self
    }

    /// Assembles the decorated service.
    pub fn build(self) -> Decorated<Req, T, E> {
        let mut service = self.operation;
        for step in self.steps.into_iter().rev() {
            service = step(service);
        }

        #[cfg(feature = "fallback")]
        if let Some(table) = self.fallback {
            service = BoxCloneService::new(FallbackLayer::new(table).layer(service));
        }

        service
    }
}

impl<T, E> Decorators<(), T, E>
where
    T: Send + 'static,
    E: Classify + Send + 'static,
{
    /// Starts from an async function taking no input.
    pub fn supplier<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self::of_fn(move |()| f())
    }
}

impl<Req, T, E> std::fmt::Debug for Decorators<Req, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decorators")
            .field("steps", &self.steps.len())
            .finish_non_exhaustive()
    }
}
