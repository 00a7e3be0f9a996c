//! Circuit breaker metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::{Layer, Service, ServiceExt};
use tower_fortify_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerLayer};
use tower_fortify_core::{Classify, ErrorKind, ResilienceError};

#[derive(Debug, Clone, PartialEq)]
struct Failure;

impl Classify for Failure {
    fn kind(&self) -> ErrorKind {
        ErrorKind::new("failure")
    }
}

#[tokio::test]
#[serial]
async fn circuitbreaker_metrics_exist() {
    init_recorder();

    let breaker = Arc::new(CircuitBreaker::new(
        "test_cb",
        CircuitBreakerConfig::builder()
            .failure_rate_threshold(50.0)
            .sliding_window_size(4)
            .wait_duration_in_open(Duration::from_millis(100))
            .build()
            .unwrap(),
    ));

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let service = tower::service_fn(move |_: u64| {
        let count = c.fetch_add(1, Ordering::SeqCst);
        async move {
            if count % 2 == 0 {
                Ok::<_, ResilienceError<Failure>>("success")
            } else {
                Err(ResilienceError::OperationFailed(Failure))
            }
        }
    });

    let mut service = CircuitBreakerLayer::new(breaker).layer(service);

    // Four outcomes fill the window at 50% and open the breaker; the rest are rejected.
    for i in 0..6 {
        let _ = service.ready().await.unwrap().call(i).await;
    }

    assert_counter_exists("circuitbreaker_calls_total");
    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "test_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "success");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "failure");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "rejected");

    assert_counter_exists("circuitbreaker_transitions_total");
    assert_metric_has_label("circuitbreaker_transitions_total", "from", "closed");
    assert_metric_has_label("circuitbreaker_transitions_total", "to", "open");

    assert_gauge_exists("circuitbreaker_state");
    assert_metric_has_label("circuitbreaker_state", "circuitbreaker", "test_cb");

    assert_histogram_exists("circuitbreaker_call_duration_seconds");
    assert_metric_has_label(
        "circuitbreaker_call_duration_seconds",
        "circuitbreaker",
        "test_cb",
    );
}

#[tokio::test]
#[serial]
async fn circuitbreaker_slow_call_metrics() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        "slow_cb",
        CircuitBreakerConfig::builder()
            .slow_call_duration_threshold(Duration::from_millis(10))
            .build()
            .unwrap(),
    );

    let _ = breaker
        .execute(|| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok::<_, ResilienceError<Failure>>(())
        })
        .await;

    assert_counter_exists("circuitbreaker_slow_calls_total");
    assert_metric_has_label("circuitbreaker_slow_calls_total", "circuitbreaker", "slow_cb");
}

#[tokio::test]
#[serial]
async fn circuitbreaker_ignored_metrics() {
    init_recorder();

    let breaker = CircuitBreaker::new(
        "ignoring_cb",
        CircuitBreakerConfig::builder()
            .ignore_kind(ErrorKind::new("failure"))
            .build()
            .unwrap(),
    );

    let permit = breaker.try_acquire_permission().unwrap();
    breaker.on_error(permit, Duration::ZERO, ErrorKind::new("failure"));

    assert_metric_has_label("circuitbreaker_calls_total", "circuitbreaker", "ignoring_cb");
    assert_metric_has_label("circuitbreaker_calls_total", "outcome", "ignored");
}
