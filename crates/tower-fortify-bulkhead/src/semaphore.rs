//! Semaphore bulkhead: bounds the number of calls in flight.

use crate::config::BulkheadConfig;
use crate::events::BulkheadEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tower_fortify_core::{Policy, Rejection};

struct Shared {
    name: String,
    config: BulkheadConfig,
    semaphore: Arc<Semaphore>,
}

impl Shared {
    fn concurrent_calls(&self) -> usize {
        self.config.max_concurrent_calls - self.semaphore.available_permits()
    }
}

/// A named semaphore bulkhead.
///
/// At most `max_concurrent_calls` [`BulkheadPermit`]s exist at any instant.
/// A permit is returned when it is dropped, so the slot is released on every
/// exit path of the protected call, including cancellation.
///
/// ```rust
/// use tower_fortify_bulkhead::{Bulkhead, BulkheadConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let config = BulkheadConfig::builder().max_concurrent_calls(1).build().unwrap();
/// let bulkhead = Bulkhead::new("inventory", config);
///
/// let permit = bulkhead.acquire_permission().await.unwrap();
/// assert!(bulkhead.try_acquire_permission().is_none());
/// drop(permit);
/// assert_eq!(bulkhead.available_permits(), 1);
/// # }
/// ```
#[derive(Clone)]
pub struct Bulkhead {
    shared: Arc<Shared>,
}

impl Bulkhead {
    /// Creates a bulkhead with every permit available.
    pub fn new(name: impl Into<String>, config: BulkheadConfig) -> Self {
        #[cfg(feature = "metrics")]
        crate::describe_metrics();

        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_calls));
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                semaphore,
            }),
        }
    }

    /// The bulkhead's name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// The bulkhead's configuration.
    pub fn config(&self) -> &BulkheadConfig {
        &self.shared.config
    }

    /// Waits up to the configured `max_wait_duration` for a permit.
    pub async fn acquire_permission(&self) -> Result<BulkheadPermit, Rejection> {
        self.acquire_permission_within(self.shared.config.max_wait_duration)
            .await
    }

    /// Waits up to `max_wait` for a permit. A zero wait never suspends.
    pub async fn acquire_permission_within(
        &self,
        max_wait: Duration,
    ) -> Result<BulkheadPermit, Rejection> {
        let semaphore = Arc::clone(&self.shared.semaphore);
        let permit = if max_wait.is_zero() {
            semaphore.try_acquire_owned().ok()
        } else {
            match tokio::time::timeout(max_wait, semaphore.acquire_owned()).await {
                Ok(Ok(permit)) => Some(permit),
                Ok(Err(_)) | Err(_) => None,
            }
        };

        match permit {
            Some(permit) => Ok(self.permitted(permit)),
            None => Err(self.rejected()),
        }
    }

    /// Takes a permit if one is free right now.
    pub fn try_acquire_permission(&self) -> Option<BulkheadPermit> {
        match Arc::clone(&self.shared.semaphore).try_acquire_owned() {
            Ok(permit) => Some(self.permitted(permit)),
            Err(_) => {
                self.rejected();
                None
            }
        }
    }

    /// Permits currently free.
    pub fn available_permits(&self) -> usize {
        self.shared.semaphore.available_permits()
    }

    /// Permits currently held.
    pub fn concurrent_calls(&self) -> usize {
        self.shared.concurrent_calls()
    }

    fn permitted(&self, permit: OwnedSemaphorePermit) -> BulkheadPermit {
        let concurrent_calls = self.shared.concurrent_calls();

        #[cfg(feature = "tracing")]
        tracing::trace!(bulkhead = %self.shared.name, concurrent_calls, "bulkhead permitted call");

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_total", "bulkhead" => self.shared.name.clone(), "outcome" => "permitted")
                .increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => self.shared.name.clone())
                .set(concurrent_calls as f64);
        }

        self.shared.config.event_listeners.emit(&BulkheadEvent::CallPermitted {
            pattern_name: self.shared.name.clone(),
            timestamp: Instant::now(),
            concurrent_calls,
        });

        BulkheadPermit {
            permit: Some(permit),
            shared: Arc::clone(&self.shared),
            acquired_at: tokio::time::Instant::now(),
        }
    }

    fn rejected(&self) -> Rejection {
        let max_concurrent_calls = self.shared.config.max_concurrent_calls;

        #[cfg(feature = "tracing")]
        tracing::debug!(bulkhead = %self.shared.name, max_concurrent_calls, "bulkhead full, call rejected");

        #[cfg(feature = "metrics")]
        counter!("bulkhead_calls_total", "bulkhead" => self.shared.name.clone(), "outcome" => "rejected")
            .increment(1);

        self.shared.config.event_listeners.emit(&BulkheadEvent::CallRejected {
            pattern_name: self.shared.name.clone(),
            timestamp: Instant::now(),
            max_concurrent_calls,
        });

        Rejection::BulkheadFull {
            name: self.shared.name.clone(),
            max_concurrent_calls,
        }
    }
}

impl std::fmt::Debug for Bulkhead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bulkhead")
            .field("name", &self.shared.name)
            .field("available_permits", &self.available_permits())
            .finish()
    }
}

impl Policy for Bulkhead {
    type Config = BulkheadConfig;

    fn from_config(name: &str, config: BulkheadConfig) -> Self {
        Bulkhead::new(name, config)
    }

    fn name(&self) -> &str {
        &self.shared.name
    }
}

/// A held bulkhead slot. Dropping it releases the slot.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct BulkheadPermit {
    permit: Option<OwnedSemaphorePermit>,
    shared: Arc<Shared>,
    acquired_at: tokio::time::Instant,
}

impl BulkheadPermit {
    /// Releases the slot. Equivalent to dropping the permit.
    pub fn release(self) {}
}

impl Drop for BulkheadPermit {
    fn drop(&mut self) {
        drop(self.permit.take());

        #[cfg(feature = "metrics")]
        {
            counter!("bulkhead_calls_total", "bulkhead" => self.shared.name.clone(), "outcome" => "finished")
                .increment(1);
            gauge!("bulkhead_concurrent_calls", "bulkhead" => self.shared.name.clone())
                .set(self.shared.concurrent_calls() as f64);
        }

        self.shared.config.event_listeners.emit(&BulkheadEvent::CallFinished {
            pattern_name: self.shared.name.clone(),
            timestamp: Instant::now(),
            duration: self.acquired_at.elapsed(),
        });
    }
}

impl std::fmt::Debug for BulkheadPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkheadPermit")
            .field("bulkhead", &self.shared.name)
            .finish()
    }
}
