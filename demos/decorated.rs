//! Decorates one backend call with every policy, all taken from a registry.
//! Run with: cargo run --example decorated

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;
use tower_fortify::bulkhead::BulkheadConfig;
use tower_fortify::circuitbreaker::CircuitBreakerConfig;
use tower_fortify::fallback::FallbackTable;
use tower_fortify::ratelimiter::RateLimiterConfig;
use tower_fortify::retry::RetryConfig;
use tower_fortify::timelimiter::TimeLimiterConfig;
use tower_fortify::{Classify, Decorators, ErrorKind, PolicyRegistry};

#[derive(Debug, Clone)]
struct BackendError;

impl Classify for BackendError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::new("backend.unavailable")
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let registry = PolicyRegistry::new()
        .with_circuit_breaker_defaults(
            CircuitBreakerConfig::builder()
                .sliding_window_size(4)
                .failure_rate_threshold(50.0)
                .wait_duration_in_open(Duration::from_millis(500))
                .build()?,
        )
        .with_bulkhead_defaults(BulkheadConfig::builder().max_concurrent_calls(2).build()?)
        .with_rate_limiter_defaults(
            RateLimiterConfig::builder()
                .limit_for_period(10)
                .limit_refresh_period(Duration::from_secs(1))
                .build()?,
        )
        .with_time_limiter_defaults(
            TimeLimiterConfig::builder()
                .timeout_duration(Duration::from_millis(200))
                .build()?,
        )
        .with_retry_defaults::<String, BackendError>(
            RetryConfig::builder()
                .max_attempts(2)
                .wait_duration(Duration::from_millis(50))
                .ignore_kind(ErrorKind::REJECTED)
                .build()?,
        );

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let service = Decorators::supplier(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n % 3 == 2 {
                Err(BackendError)
            } else {
                Ok(format!("response #{n}"))
            }
        }
    })
    .with_retry(registry.retry("backendA"))
    .with_circuit_breaker(registry.circuit_breaker("backendA"))
    .with_rate_limiter(registry.rate_limiter("backendA"))
    .with_bulkhead(registry.bulkhead("backendA"))
    .with_time_limiter(registry.time_limiter("backendA"))
    .with_fallback(
        FallbackTable::builder()
            .on_value(ErrorKind::REJECTED, "cached response".to_string())
            .on_value(ErrorKind::new("backend"), "degraded response".to_string())
            .build(),
    )
    .build();

    for _ in 0..8 {
        let result = service.clone().oneshot(()).await;
        println!("{result:?}");
    }

    println!("backend invoked {} times", calls.load(Ordering::SeqCst));
    println!("breaker: {:?}", registry.circuit_breaker("backendA").metrics());
    Ok(())
}
