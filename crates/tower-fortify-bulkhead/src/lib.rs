//! Bulkhead pattern for Tower services.
//!
//! A bulkhead isolates one dependency's load from the rest of the system.
//! Two variants are provided:
//!
//! - [`Bulkhead`] hands out at most `max_concurrent_calls` permits, waiting
//!   up to `max_wait_duration` for one to free up.
//! - [`ThreadPoolBulkhead`] runs jobs on a bounded set of worker tasks behind
//!   a bounded queue and rejects immediately once both are full.
//!
//! ## Basic Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::{service_fn, ServiceBuilder};
//! use tower_fortify_bulkhead::{Bulkhead, BulkheadConfig, BulkheadLayer};
//! use tower_fortify_core::ResilienceError;
//!
//! let config = BulkheadConfig::builder()
//!     .max_concurrent_calls(10)
//!     .max_wait_duration(Duration::from_millis(100))
//!     .build()
//!     .unwrap();
//! let bulkhead = Arc::new(Bulkhead::new("inventory", config));
//!
//! let service = ServiceBuilder::new()
//!     .layer(BulkheadLayer::new(bulkhead))
//!     .service(service_fn(|req: String| async move {
//!         Ok::<_, ResilienceError<std::io::Error>>(req)
//!     }));
//! ```
//!
//! ## Feature Flags
//! - `metrics`: `bulkhead_calls_total` counter plus concurrency and queue gauges
//! - `tracing`: rejections and queueing are logged

pub use config::{
    BulkheadConfig, BulkheadConfigBuilder, ThreadPoolBulkheadConfig,
    ThreadPoolBulkheadConfigBuilder,
};
pub use events::BulkheadEvent;
pub use layer::{BulkheadLayer, BulkheadService, ThreadPoolBulkheadLayer, ThreadPoolBulkheadService};
pub use pool::{PoolHandle, ThreadPoolBulkhead};
pub use semaphore::{Bulkhead, BulkheadPermit};

mod config;
pub mod events;
mod layer;
mod pool;
mod semaphore;

#[cfg(feature = "metrics")]
static METRICS_INIT: std::sync::Once = std::sync::Once::new();

#[cfg(feature = "metrics")]
pub(crate) fn describe_metrics() {
    use metrics::{describe_counter, describe_gauge};

    METRICS_INIT.call_once(|| {
        describe_counter!(
            "bulkhead_calls_total",
            "Total number of calls through the bulkhead, by outcome"
        );
        describe_gauge!(
            "bulkhead_concurrent_calls",
            "Number of calls currently holding a bulkhead slot"
        );
        describe_gauge!(
            "bulkhead_queue_depth",
            "Number of jobs waiting for a pool worker"
        );
    });
}
