use crate::TimeLimiter;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tower_fortify_core::ResilienceError;

/// A Tower Layer that bounds every call by a shared [`TimeLimiter`]'s deadline.
#[derive(Clone, Debug)]
pub struct TimeLimiterLayer {
    limiter: Arc<TimeLimiter>,
}

impl TimeLimiterLayer {
    /// Creates a layer enforcing `limiter`'s deadline.
    pub fn new(limiter: Arc<TimeLimiter>) -> Self {
        Self { limiter }
    }
}

impl<S> Layer<S> for TimeLimiterLayer {
    type Service = TimeLimiterService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeLimiterService {
            inner,
            limiter: Arc::clone(&self.limiter),
        }
    }
}

/// Service produced by [`TimeLimiterLayer`].
#[derive(Clone, Debug)]
pub struct TimeLimiterService<S> {
    inner: S,
    limiter: Arc<TimeLimiter>,
}

impl<S, Req, E> Service<Req> for TimeLimiterService<S>
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
        let operation = self.inner.call(req);

        Box::pin(async move { limiter.execute(operation).await })
    }
}
