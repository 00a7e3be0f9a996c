use crate::RateLimiter;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tower_fortify_core::ResilienceError;

/// A Tower Layer that admits calls through a shared [`RateLimiter`].
#[derive(Clone, Debug)]
pub struct RateLimiterLayer {
    limiter: Arc<RateLimiter>,
}

impl RateLimiterLayer {
    /// Creates a layer drawing permits from `limiter`.
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiterService {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service produced by [`RateLimiterLayer`].
#[derive(Clone, Debug)]
pub struct RateLimiterService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
}

impl<S, Req, E> Service<Req> for RateLimiterService<S>
where
    S: Service<Req, Error = ResilienceError<E>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = ResilienceError<E>;
    type Future = BoxFuture<'static, Result<S::Response, ResilienceError<E>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let limiter = Arc::clone(&self.limiter);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            limiter.acquire_permission().await?;
            inner.call(req).await
        })
    }
}
