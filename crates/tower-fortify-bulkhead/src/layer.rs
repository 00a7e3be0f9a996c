//! Tower layers for both bulkhead variants.

use crate::pool::ThreadPoolBulkhead;
use crate::semaphore::Bulkhead;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tower_fortify_core::ResilienceError;

/// A Tower Layer that bounds concurrent calls with a shared [`Bulkhead`].
#[derive(Clone, Debug)]
pub struct BulkheadLayer {
    bulkhead: Arc<Bulkhead>,
}

impl BulkheadLayer {
    /// Creates a layer drawing permits from `bulkhead`.
    pub fn new(bulkhead: Arc<Bulkhead>) -> Self {
        Self { bulkhead }
    }
}

impl<S> Layer<S> for BulkheadLayer {
    type Service = BulkheadService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BulkheadService {
            inner,
            bulkhead: Arc::clone(&self.bulkhead),
        }
    }
}

/// Service produced by [`BulkheadLayer`].
#[derive(Clone, Debug)]
pub struct BulkheadService<S> {
    inner: S,
    bulkhead: Arc<Bulkhead>,
}

impl<S, Req, E> Service<Req> for BulkheadService<S>
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
        let bulkhead = Arc::clone(&self.bulkhead);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let permit = bulkhead.acquire_permission().await?;
            let result = inner.call(req).await;
            permit.release();
            result
        })
    }
}

/// A Tower Layer that runs calls on a shared [`ThreadPoolBulkhead`].
///
/// The inner service's future is submitted to the pool as a job; the
/// returned future waits for the job's result.
#[derive(Clone, Debug)]
pub struct ThreadPoolBulkheadLayer {
    pool: Arc<ThreadPoolBulkhead>,
}

impl ThreadPoolBulkheadLayer {
    /// Creates a layer submitting to `pool`.
    pub fn new(pool: Arc<ThreadPoolBulkhead>) -> Self {
        Self { pool }
    }
}

impl<S> Layer<S> for ThreadPoolBulkheadLayer {
    type Service = ThreadPoolBulkheadService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ThreadPoolBulkheadService {
            inner,
            pool: Arc::clone(&self.pool),
        }
    }
}

/// Service produced by [`ThreadPoolBulkheadLayer`].
#[derive(Clone, Debug)]
pub struct ThreadPoolBulkheadService<S> {
    inner: S,
    pool: Arc<ThreadPoolBulkhead>,
}

impl<S, Req, E> Service<Req> for ThreadPoolBulkheadService<S>
where
    S: Service<Req, Error = ResilienceError<E>>,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = ResilienceError<E>;
    type Future = BoxFuture<'static, Result<S::Response, ResilienceError<E>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let submitted = self.pool.submit(self.inner.call(req));

        Box::pin(async move {
            match submitted?.await {
                Ok(result) => result,
                Err(rejection) => Err(rejection.into()),
            }
        })
    }
}
