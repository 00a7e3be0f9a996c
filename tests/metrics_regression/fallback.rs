//! Fallback metrics regression tests

use super::helpers::*;
use serial_test::serial;
use tower_fortify_core::{ErrorKind, ResilienceError};
use tower_fortify_fallback::FallbackTable;

#[tokio::test]
#[serial]
async fn fallback_metrics_exist() {
    init_recorder();

    let table = FallbackTable::<u32, ErrorKind>::builder()
        .name("test_fallback")
        .on_value(ErrorKind::TIMEOUT, 0)
        .build();

    let applied = table
        .recover(ResilienceError::CallTimedOut {
            name: "upstream".to_string(),
            timeout: std::time::Duration::from_secs(1),
        })
        .await;
    assert_eq!(applied, Ok(0));

    let unhandled = table
        .recover(ResilienceError::OperationFailed(ErrorKind::new("io")))
        .await;
    assert!(unhandled.is_err());

    assert_counter_exists("fallback_calls_total");
    assert_metric_has_label("fallback_calls_total", "fallback", "test_fallback");
    assert_metric_has_label("fallback_calls_total", "result", "applied");
    assert_metric_has_label("fallback_calls_total", "result", "unhandled");
}
