use crate::FallbackTable;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tower_fortify_core::{Classify, ResilienceError};

/// A Tower Layer that recovers failed calls through a [`FallbackTable`].
pub struct FallbackLayer<T, E> {
    table: Arc<FallbackTable<T, E>>,
}

impl<T, E> FallbackLayer<T, E> {
    /// Creates a layer owning `table`.
    pub fn new(table: FallbackTable<T, E>) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    /// Creates a layer from an already shared table.
    pub fn from_shared(table: Arc<FallbackTable<T, E>>) -> Self {
        Self { table }
    }
}

impl<T, E> Clone for FallbackLayer<T, E> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
        }
    }
}

impl<T, E> fmt::Debug for FallbackLayer<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackLayer")
            .field("table", &self.table)
            .finish()
    }
}

impl<S, T, E> Layer<S> for FallbackLayer<T, E> {
    type Service = FallbackService<S, T, E>;

    fn layer(&self, inner: S) -> Self::Service {
        FallbackService {
            inner,
            table: Arc::clone(&self.table),
        }
    }
}

/// Service produced by [`FallbackLayer`].
pub struct FallbackService<S, T, E> {
    inner: S,
    table: Arc<FallbackTable<T, E>>,
}

impl<S: Clone, T, E> Clone for FallbackService<S, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            table: Arc::clone(&self.table),
        }
    }
}

impl<S: fmt::Debug, T, E> fmt::Debug for FallbackService<S, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackService")
            .field("inner", &self.inner)
            .field("table", &self.table)
            .finish()
    }
}

impl<S, Req, T, E> Service<Req> for FallbackService<S, T, E>
where
    S: Service<Req, Response = T, Error = ResilienceError<E>>,
    S::Future: Send + 'static,
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
        let table = Arc::clone(&self.table);
        let call = self.inner.call(req);

        Box::pin(async move {
            match call.await {
                Ok(response) => Ok(response),
                Err(error) => table.recover(error).await,
            }
        })
    }
}
