//! Rate limiter metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::time::Duration;
use tower_fortify_ratelimiter::{RateLimiter, RateLimiterConfig};

#[tokio::test]
#[serial]
async fn ratelimiter_metrics_exist() {
    init_recorder();

    let limiter = RateLimiter::new(
        "test_limiter",
        RateLimiterConfig::builder()
            .limit_for_period(1)
            .limit_refresh_period(Duration::from_secs(10))
            .timeout_duration(Duration::ZERO)
            .build()
            .unwrap(),
    );

    assert!(limiter.acquire_permission().await.is_ok());
    assert!(limiter.acquire_permission().await.is_err());

    assert_counter_exists("ratelimiter_calls_total");
    assert_metric_has_label("ratelimiter_calls_total", "ratelimiter", "test_limiter");
    assert_metric_has_label("ratelimiter_calls_total", "result", "permitted");
    assert_metric_has_label("ratelimiter_calls_total", "result", "rejected");

    assert_histogram_exists("ratelimiter_wait_duration_seconds");
    assert_metric_has_label(
        "ratelimiter_wait_duration_seconds",
        "ratelimiter",
        "test_limiter",
    );

    assert_gauge_exists("ratelimiter_available_permits");
    assert_metric_has_label(
        "ratelimiter_available_permits",
        "ratelimiter",
        "test_limiter",
    );
}
