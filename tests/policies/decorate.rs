use super::TestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tower_fortify::bulkhead::BulkheadConfig;
use tower_fortify::circuitbreaker::{CircuitBreakerConfig, CircuitState};
use tower_fortify::fallback::FallbackTable;
use tower_fortify::retry::{Retry, RetryConfig};
use tower_fortify::timelimiter::TimeLimiterConfig;
use tower_fortify::{Decorators, ErrorKind, PolicyRegistry, ResilienceError};

fn registry() -> PolicyRegistry {
    PolicyRegistry::new()
        .with_circuit_breaker_defaults(
            CircuitBreakerConfig::builder()
                .sliding_window_size(2)
                .failure_rate_threshold(50.0)
                .wait_duration_in_open(Duration::from_secs(1))
                .permitted_calls_in_half_open(1)
                .build()
                .unwrap(),
        )
        .with_bulkhead_defaults(
            BulkheadConfig::builder()
                .max_concurrent_calls(4)
                .build()
                .unwrap(),
        )
        .with_time_limiter_defaults(
            TimeLimiterConfig::builder()
                .timeout_duration(Duration::from_millis(200))
                .build()
                .unwrap(),
        )
}

#[tokio::test(start_paused = true)]
async fn full_stack_happy_path() {
    let registry = registry();
    let service = Decorators::of_fn(|id: u32| async move { Ok::<_, TestError>(id * 2) })
        .with_bulkhead(registry.bulkhead("backendA"))
        .with_time_limiter(registry.time_limiter("backendA"))
        .with_circuit_breaker(registry.circuit_breaker("backendA"))
        .build();

    assert_eq!(service.clone().oneshot(21).await.unwrap(), 42);
    assert_eq!(registry.bulkhead("backendA").available_permits(), 4);
    assert_eq!(registry.circuit_breaker("backendA").metrics().buffered_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn timeouts_inside_the_breaker_count_as_failures() {
    let registry = registry();
    let service = Decorators::supplier(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok::<_, TestError>("late")
    })
    .with_circuit_breaker(registry.circuit_breaker("backendA"))
    .with_time_limiter(registry.time_limiter("backendA"))
    .build();

    for _ in 0..2 {
        let err = service.clone().oneshot(()).await.unwrap_err();
        assert!(err.is_timeout());
    }
    assert_eq!(registry.circuit_breaker("backendA").state(), CircuitState::Open);

    let err = service.oneshot(()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CIRCUIT_OPEN);
}

#[tokio::test(start_paused = true)]
async fn fallback_picks_the_most_specific_handler() {
    let registry = registry();
    let breaker = registry.circuit_breaker("backendA");
    breaker.transition_to_forced_open();

    let table = || {
        FallbackTable::<String, TestError>::builder()
            .on_value(ErrorKind::ANY, "anything".to_string())
            .on_value(ErrorKind::REJECTED, "rejected".to_string())
            .on_value(ErrorKind::CIRCUIT_OPEN, "circuit open".to_string())
            .on(ErrorKind::new("backend"), |err: &ResilienceError<TestError>| {
                format!("backend said {}", err.operation_error().map_or("?", |e| e.0))
            })
    };

    let rejected = Decorators::supplier(|| async { Ok::<_, TestError>("live".to_string()) })
        .with_circuit_breaker(Arc::clone(&breaker))
        .with_fallback(table().build())
        .build();
    assert_eq!(rejected.oneshot(()).await.unwrap(), "circuit open");

    let failing = Decorators::supplier(|| async {
        Err::<String, _>(TestError("backend.unavailable"))
    })
    .with_fallback(table().build())
    .build();
    assert_eq!(
        failing.oneshot(()).await.unwrap(),
        "backend said backend.unavailable"
    );
}

#[tokio::test(start_paused = true)]
async fn unmatched_failures_propagate_unchanged() {
    let service = Decorators::supplier(|| async { Err::<u32, _>(TestError("disk.full")) })
        .with_fallback(
            FallbackTable::builder()
                .on_value(ErrorKind::TIMEOUT, 0)
                .build(),
        )
        .build();

    let err = service.oneshot(()).await.unwrap_err();
    assert_eq!(err, ResilienceError::OperationFailed(TestError("disk.full")));
}

#[tokio::test(start_paused = true)]
async fn retry_outside_breaker_stops_once_it_opens() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let registry = registry();
    let retry = Arc::new(Retry::new(
        "backendA",
        RetryConfig::builder()
            .max_attempts(5)
            .wait_duration(Duration::from_millis(10))
            .ignore_kind(ErrorKind::CIRCUIT_OPEN)
            .build()
            .unwrap(),
    ));

    let service = Decorators::supplier(move || {
        c.fetch_add(1, Ordering::SeqCst);
        async { Err::<(), _>(TestError("io")) }
    })
    .with_retry(retry)
    .with_circuit_breaker(registry.circuit_breaker("backendA"))
    .build();

    let err = service.oneshot(()).await.unwrap_err();
    // Two failures open the breaker; the third attempt is rejected and not retried.
    assert_eq!(err.kind(), ErrorKind::CIRCUIT_OPEN);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
