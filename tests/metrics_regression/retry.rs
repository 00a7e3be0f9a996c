//! Retry metrics regression tests

use super::helpers::*;
use serial_test::serial;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower_fortify_core::{Classify, ErrorKind, ResilienceError};
use tower_fortify_retry::{Retry, RetryConfig};

#[derive(Debug, Clone, PartialEq)]
struct Failure(&'static str);

impl Classify for Failure {
    fn kind(&self) -> ErrorKind {
        ErrorKind::new(self.0)
    }
}

fn retry() -> Retry<u32, Failure> {
    Retry::new(
        "test_retry",
        RetryConfig::builder()
            .max_attempts(3)
            .wait_duration(Duration::from_millis(1))
            .ignore_kind(ErrorKind::new("fatal"))
            .build()
            .unwrap(),
    )
}

#[tokio::test]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();
    let retry = retry();

    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let recovered = retry
        .execute(|| {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ResilienceError::OperationFailed(Failure("io")))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
    assert_eq!(recovered, Ok(7));

    let exhausted = retry
        .execute(|| async { Err(ResilienceError::OperationFailed(Failure("io"))) })
        .await;
    assert!(exhausted.is_err());

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "test_retry");
    assert_metric_has_label("retry_calls_total", "result", "success_with_retry");
    assert_metric_has_label("retry_calls_total", "result", "exhausted");

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "test_retry");
}

#[tokio::test]
#[serial]
async fn retry_ignored_and_first_try_metrics() {
    init_recorder();
    let retry = retry();

    assert_eq!(retry.execute(|| async { Ok(1) }).await, Ok(1));
    let ignored = retry
        .execute(|| async { Err(ResilienceError::OperationFailed(Failure("fatal.config"))) })
        .await;
    assert!(ignored.is_err());

    assert_metric_has_label("retry_calls_total", "result", "success_without_retry");
    assert_metric_has_label("retry_calls_total", "result", "ignored");
}
