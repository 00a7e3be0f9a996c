use crate::Retry;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};
use tower_fortify_core::{Classify, ResilienceError};

/// A Tower Layer that retries failed requests through a shared [`Retry`].
///
/// Requests must be `Clone`: every attempt sends a fresh copy.
pub struct RetryLayer<T, E> {
    retry: Arc<Retry<T, E>>,
}

impl<T, E> RetryLayer<T, E> {
    /// Creates a layer retrying according to `retry`.
    pub fn new(retry: Arc<Retry<T, E>>) -> Self {
        Self { retry }
    }
}

impl<T, E> Clone for RetryLayer<T, E> {
    fn clone(&self) -> Self {
        Self {
            retry: Arc::clone(&self.retry),
        }
    }
}

impl<T, E> fmt::Debug for RetryLayer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryLayer")
            .field("retry", &self.retry)
            .finish()
    }
}

impl<S, T, E> Layer<S> for RetryLayer<T, E> {
    type Service = RetryService<S, T, E>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            retry: Arc::clone(&self.retry),
        }
    }
}

/// Service produced by [`RetryLayer`].
pub struct RetryService<S, T, E> {
    inner: S,
    retry: Arc<Retry<T, E>>,
}

impl<S: Clone, T, E> Clone for RetryService<S, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            retry: Arc::clone(&self.retry),
        }
    }
}

impl<S: fmt::Debug, T, E> fmt::Debug for RetryService<S, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryService")
            .field("inner", &self.inner)
            .field("retry", &self.retry)
            .finish()
    }
}

impl<S, Req, T, E> Service<Req> for RetryService<S, T, E>
where
    S: Service<Req, Response = T, Error = ResilienceError<E>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    T: Send + 'static,
    E: Classify + Send + 'static,
{
    type Response = T;
    type Error = ResilienceError<E>;
    type Future = BoxFuture<'static, Result<T, ResilienceError<E>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let retry = Arc::clone(&self.retry);
        let inner = self.inner.clone();

        Box::pin(async move {
            retry
                .execute(move || {
                    let mut service = inner.clone();
                    let req = req.clone();
                    async move { service.ready().await?.call(req).await }
                })
                .await
        })
    }
}
