use crate::{CallPermit, CircuitBreaker};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{Layer, Service};
use tower_fortify_core::{Classify, Clock, ResilienceError};

/// A Tower Layer that gates an inner service with a shared [`CircuitBreaker`].
///
/// Every service produced by the layer reports to the same breaker, so the
/// accounting is shared with direct API calls and with the registry entry the
/// breaker came from.
///
/// ```rust
/// use std::sync::Arc;
/// use tower::{service_fn, ServiceBuilder};
/// use tower_fortify_circuitbreaker::{CircuitBreaker, CircuitBreakerLayer};
/// use tower_fortify_core::ResilienceError;
///
/// let breaker = Arc::new(CircuitBreaker::with_defaults("backendA"));
/// let service = ServiceBuilder::new()
///     .layer(CircuitBreakerLayer::new(breaker))
///     .service(service_fn(|req: String| async move {
///         Ok::<_, ResilienceError<std::io::Error>>(req)
///     }));
/// ```
#[derive(Clone, Debug)]
pub struct CircuitBreakerLayer {
    breaker: Arc<CircuitBreaker>,
}

impl CircuitBreakerLayer {
    /// Creates a layer reporting to `breaker`.
    pub fn new(breaker: Arc<CircuitBreaker>) -> Self {
        Self { breaker }
    }

    /// The breaker this layer reports to.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            breaker: Arc::clone(&self.breaker),
        }
    }
}

/// Service produced by [`CircuitBreakerLayer`].
#[derive(Clone, Debug)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: Arc<CircuitBreaker>,
}

impl<S> CircuitBreakerService<S> {
    /// The breaker this service reports to.
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}

impl<S, Req, E> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req, Error = ResilienceError<E>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Send + 'static,
    E: Classify + Send + 'static,
{
    type Response = S::Response;
    type Error = ResilienceError<E>;
    type Future = BoxFuture<'static, Result<S::Response, ResilienceError<E>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let breaker = Arc::clone(&self.breaker);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let guard = PermitGuard::new(&breaker, breaker.acquire_permission()?);
            let clock = &breaker.config().clock;
            let start = clock.now();
            let result = inner.call(req).await;
            let duration = clock.now().saturating_duration_since(start);

            guard.report(duration, &result);
            result
        })
    }
}

/// Hands the permit back if the call never reports an outcome.
pub(crate) struct PermitGuard<'a> {
    breaker: &'a CircuitBreaker,
    permit: Option<CallPermit>,
}

impl<'a> PermitGuard<'a> {
    pub(crate) fn new(breaker: &'a CircuitBreaker, permit: CallPermit) -> Self {
        Self {
            breaker,
            permit: Some(permit),
        }
    }

    /// Reports the call's outcome against the guarded permit.
    pub(crate) fn report<T, E: Classify>(mut self, duration: Duration, result: &Result<T, E>) {
        if let Some(permit) = self.permit.take() {
            self.breaker.on_result(permit, duration, result);
        }
    }
}

impl Drop for PermitGuard<'_> {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            self.breaker.release_permission(permit);
        }
    }
}
