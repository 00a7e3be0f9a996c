//! Time limiter metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::time::Duration;
use tower_fortify_core::{ErrorKind, ResilienceError};
use tower_fortify_timelimiter::{TimeLimiter, TimeLimiterConfig};

#[tokio::test]
#[serial]
async fn timelimiter_metrics_exist() {
    init_recorder();

    let limiter = TimeLimiter::new(
        "test_timelimiter",
        TimeLimiterConfig::builder()
            .timeout_duration(Duration::from_millis(20))
            .build()
            .unwrap(),
    );

    let fast: Result<u32, ResilienceError<ErrorKind>> = limiter.execute(async { Ok(1) }).await;
    assert_eq!(fast, Ok(1));

    let slow: Result<u32, ResilienceError<ErrorKind>> = limiter
        .execute(async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(2)
        })
        .await;
    assert!(slow.unwrap_err().is_timeout());

    assert_counter_exists("timelimiter_calls_total");
    assert_metric_has_label("timelimiter_calls_total", "timelimiter", "test_timelimiter");
    assert_metric_has_label("timelimiter_calls_total", "result", "success");
    assert_metric_has_label("timelimiter_calls_total", "result", "timeout");

    assert_histogram_exists("timelimiter_call_duration_seconds");
    assert_metric_has_label(
        "timelimiter_call_duration_seconds",
        "timelimiter",
        "test_timelimiter",
    );
}
