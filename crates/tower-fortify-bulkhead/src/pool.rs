//! Pool bulkhead: runs jobs on a bounded set of workers behind a bounded queue.

use crate::config::ThreadPoolBulkheadConfig;
use crate::events::BulkheadEvent;
use futures::future::{BoxFuture, FutureExt};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};
use std::time::Instant;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tower_fortify_core::{Policy, Rejection};

type Job = BoxFuture<'static, ()>;

#[derive(Default)]
struct PoolState {
    running: usize,
    queue: VecDeque<Job>,
}

struct Shared {
    name: String,
    config: ThreadPoolBulkheadConfig,
    state: Mutex<PoolState>,
}

enum Admission {
    Start(Job, usize),
    Queued(usize),
    Rejected,
}

/// A named bulkhead that executes submitted jobs on its own workers.
///
/// Workers are tokio tasks. At most `max_threads` jobs run at once and at
/// most `queue_capacity` wait; anything beyond that is rejected immediately.
/// A job is admitted in this order: a new worker while fewer than
/// `core_threads` run, then a queue slot, then an extra worker up to
/// `max_threads`.
///
/// ```rust
/// use tower_fortify_bulkhead::{ThreadPoolBulkhead, ThreadPoolBulkheadConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = ThreadPoolBulkheadConfig::builder()
///     .core_threads(1)
///     .max_threads(2)
///     .queue_capacity(10)
///     .build()
///     .unwrap();
/// let pool = ThreadPoolBulkhead::new("reports", config);
///
/// let handle = pool.submit(async { 40 + 2 }).unwrap();
/// assert_eq!(handle.await.unwrap(), 42);
/// # }
/// ```
#[derive(Clone)]
pub struct ThreadPoolBulkhead {
    shared: Arc<Shared>,
}

impl ThreadPoolBulkhead {
    /// Creates an idle pool.
    pub fn new(name: impl Into<String>, config: ThreadPoolBulkheadConfig) -> Self {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();

        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                state: Mutex::new(PoolState::default()),
            }),
        }
    }

    /// The pool's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The pool's configuration.
    pub fn config(&self) -> &ThreadPoolBulkheadConfig {
        &self.shared.config
    }

    /// Jobs currently running.
    pub fn running(&self) -> usize {
        self.shared.state.lock().running
    }

    /// Jobs waiting for a worker.
    pub fn queue_depth(&self) -> usize {
        self.shared.state.lock().queue.len()
    }

    /// Submits `job` and returns a handle to its result.
    ///
    /// Never waits: a saturated pool rejects with
    /// [`Rejection::BulkheadFull`]. Without a configured runtime handle this
    /// must be called from inside a tokio runtime, otherwise the job is
    /// refused with [`Rejection::ShutDown`]. Dropping the returned handle
    /// does not cancel the job.
    pub fn submit<F>(&self, job: F) -> Result<PoolHandle<F::Output>, Rejection>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let handle = match &self.shared.config.handle {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| Rejection::ShutDown {
                name: self.shared.name.clone(),
            })?,
        };

        let (tx, rx) = oneshot::channel();
        let job: Job = Box::pin(async move {
            let outcome = AssertUnwindSafe(job).catch_unwind().await;
            let _ = tx.send(outcome);
        });

        let admission = {
            let config = &self.shared.config;
            let mut state = self.shared.state.lock();
            if state.running < config.core_threads {
                state.running += 1;
                Admission::Start(job, state.running)
            } else if state.queue.len() < config.queue_capacity {
                state.queue.push_back(job);
                Admission::Queued(state.queue.len())
            } else if state.running < config.max_threads {
                state.running += 1;
                Admission::Start(job, state.running)
            } else {
                Admission::Rejected
            }
        };

        match admission {
            Admission::Start(job, running) => {
                self.shared.on_permitted(running);
                spawn_worker(&handle, Arc::clone(&self.shared), job);
            }
            Admission::Queued(queue_depth) => self.shared.on_queued(queue_depth),
            Admission::Rejected => return Err(self.shared.on_rejected()),
        }

        Ok(PoolHandle {
            rx,
            name: self.shared.name.clone(),
        })
    }
}

fn spawn_worker(handle: &Handle, shared: Arc<Shared>, first: Job) {
    handle.spawn(async move {
        let mut next = Some(first);
        while let Some(job) = next {
            let started = tokio::time::Instant::now();
            job.await;
            shared.on_finished(started.elapsed());

            next = {
                let mut state = shared.state.lock();
                let job = state.queue.pop_front();
                if job.is_none() {
                    state.running -= 1;
                }
                job
            };
            if next.is_some() {
                let running = shared.state.lock().running;
                shared.on_permitted(running);
            }
        }
    });
}

impl Shared {
    fn on_permitted(&self, running: usize) {
        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_total", "bulkhead" => self.name.clone(), "outcome" => "permitted")
                .increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => self.name.clone()).set(running as f64);
        }

        self.config.event_listeners.emit(&BulkheadEvent::CallPermitted {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            concurrent_calls: running,
        });
    }

    fn on_queued(&self, queue_depth: usize) {
        #[cfg(feature = "tracing")]
        tracing::trace!(bulkhead = %self.name, queue_depth, "job queued");

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_total", "bulkhead" => self.name.clone(), "outcome" => "queued")
                .increment(1);
            gauge!("bulkhead_queue_depth", "bulkhead" => self.name.clone()).set(queue_depth as f64);
        }

        self.config.event_listeners.emit(&BulkheadEvent::CallQueued {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            queue_depth,
        });
    }

    fn on_rejected(&self) -> Rejection {
        let max_concurrent_calls = self.config.max_threads;

        #[cfg(feature = "tracing")]
        tracing::debug!(bulkhead = %self.name, max_concurrent_calls, "pool and queue saturated, job rejected");

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_total", "bulkhead" => self.name.clone(), "outcome" => "rejected")
            .increment(1);

        self.config.event_listeners.emit(&BulkheadEvent::CallRejected {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            max_concurrent_calls,
        });

        Rejection::BulkheadFull {
            name: self.name.clone(),
            max_concurrent_calls,
        }
    }

    fn on_finished(&self, duration: std::time::Duration) {
        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_total", "bulkhead" => self.name.clone(), "outcome" => "finished")
            .increment(1);

        self.config.event_listeners.emit(&BulkheadEvent::CallFinished {
            pattern_name: self.name.clone(),
            timestamp: Instant::now(),
            duration,
        });
    }
}

impl std::fmt::Debug for ThreadPoolBulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadPoolBulkhead")
            .field("name", &self.shared.name)
            .field("running", &self.running())
            .field("queue_depth", &self.queue_depth())
            .finish()
    }
}

impl Policy for ThreadPoolBulkhead {
    type Config = ThreadPoolBulkheadConfig;

    fn from_config(name: &str, config: ThreadPoolBulkheadConfig) -> Self {
        ThreadPoolBulkhead::new(name, config)
    }

    fn name(&self) -> &str {
        &self.shared.name
    }
}

/// Deferred result of a job submitted to a [`ThreadPoolBulkhead`].
///
/// Resolves to the job's output. A panic inside the job is resumed in the
/// task awaiting the handle. If the job is dropped before it finishes (for
/// example because the runtime shut down) the handle resolves to
/// [`Rejection::ShutDown`].
#[must_use = "futures do nothing unless polled"]
pub struct PoolHandle<T> {
    rx: oneshot::Receiver<std::thread::Result<T>>,
    name: String,
}

impl<T> Future for PoolHandle<T> {
    type Output = Result<T, Rejection>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match ready!(Pin::new(&mut self.rx).poll(cx)) {
            Ok(Ok(value)) => Poll::Ready(Ok(value)),
            Ok(Err(panic)) => std::panic::resume_unwind(panic),
            Err(_) => Poll::Ready(Err(Rejection::ShutDown {
                name: self.name.clone(),
            })),
        }
    }
}

impl<T> std::fmt::Debug for PoolHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolHandle").field("bulkhead", &self.name).finish()
    }
}
