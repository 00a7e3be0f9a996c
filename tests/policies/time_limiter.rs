use super::TestError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::{service_fn, Layer, ServiceExt};
use tower_fortify_core::{ErrorKind, ResilienceError};
use tower_fortify_timelimiter::{TimeLimiter, TimeLimiterConfig, TimeLimiterLayer};

/// Sets its flag when dropped before completion.
struct CancelProbe {
    cancelled: Arc<AtomicBool>,
    armed: bool,
}

impl Drop for CancelProbe {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.store(true, Ordering::SeqCst);
        }
    }
}

fn limiter(timeout: Duration, cancel: bool) -> TimeLimiter {
    TimeLimiter::new(
        "backendA",
        TimeLimiterConfig::builder()
            .timeout_duration(timeout)
            .cancel_running_operation(cancel)
            .build()
            .unwrap(),
    )
}

async fn slow_operation(
    duration: Duration,
    cancelled: Arc<AtomicBool>,
) -> Result<&'static str, ResilienceError<TestError>> {
    let mut probe = CancelProbe {
        cancelled,
        armed: true,
    };
    tokio::time::sleep(duration).await;
    probe.armed = false;
    Ok("done")
}

#[tokio::test(start_paused = true)]
async fn slow_operation_times_out_and_is_cancelled() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let limiter = limiter(Duration::from_millis(500), true);

    let start = Instant::now();
    let err = limiter
        .execute(slow_operation(Duration::from_secs(2), Arc::clone(&cancelled)))
        .await
        .unwrap_err();

    assert_eq!(start.elapsed(), Duration::from_millis(500));
    assert_eq!(
        err,
        ResilienceError::CallTimedOut {
            name: "backendA".to_string(),
            timeout: Duration::from_millis(500),
        }
    );
    assert_eq!(err.kind(), ErrorKind::TIMEOUT);

    // The abort lands once the runtime gets to the task again.
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert!(cancelled.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn without_cancellation_the_operation_finishes_detached() {
    let cancelled = Arc::new(AtomicBool::new(false));
    let finished = Arc::new(AtomicUsize::new(0));
    let f = Arc::clone(&finished);
    let limiter = limiter(Duration::from_millis(500), false);

    let c = Arc::clone(&cancelled);
    let err = limiter
        .execute(async move {
            let result = slow_operation(Duration::from_secs(2), c).await;
            f.fetch_add(1, Ordering::SeqCst);
            result
        })
        .await
        .unwrap_err();
    assert!(err.is_timeout());

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert!(!cancelled.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn fast_operation_result_is_returned() {
    let limiter = limiter(Duration::from_millis(500), true);

    let ok = limiter
        .execute(async { Ok::<_, ResilienceError<TestError>>(7) })
        .await;
    assert_eq!(ok, Ok(7));

    let failed = limiter
        .execute(async { Err::<u32, _>(ResilienceError::OperationFailed(TestError("io"))) })
        .await;
    assert_eq!(failed, Err(ResilienceError::OperationFailed(TestError("io"))));
}

#[tokio::test(start_paused = true)]
async fn explicit_deadline_overrides_the_configured_one() {
    let limiter = limiter(Duration::from_secs(10), true);
    let start = Instant::now();
    let err = limiter
        .execute_with_deadline(
            slow_operation(Duration::from_secs(2), Arc::new(AtomicBool::new(false))),
            Duration::from_millis(100),
        )
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(start.elapsed(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn exactly_one_outcome_reaches_the_caller() {
    let outcomes = Arc::new(AtomicUsize::new(0));
    let o1 = Arc::clone(&outcomes);
    let o2 = Arc::clone(&outcomes);
    let limiter = Arc::new(TimeLimiter::new(
        "backendA",
        TimeLimiterConfig::builder()
            .timeout_duration(Duration::from_millis(100))
            .on_success(move |_| {
                o1.fetch_add(1, Ordering::SeqCst);
            })
            .on_timeout(move || {
                o2.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    ));

    // The operation and the deadline fire at the same instant.
    let service = TimeLimiterLayer::new(limiter).layer(service_fn(|_: ()| async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, ResilienceError<TestError>>(())
    }));
    let _ = service.oneshot(()).await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(outcomes.load(Ordering::SeqCst), 1);
}
