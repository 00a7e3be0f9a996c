use super::TestError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::{service_fn, Layer, ServiceExt};
use tower_fortify_core::{ErrorKind, Rejection, ResilienceError};
use tower_fortify_retry::{ExponentialBackoff, Retry, RetryConfig, RetryLayer};

type Outcome<T> = Result<T, ResilienceError<TestError>>;

/// Records the instant of every invocation.
#[derive(Clone, Default)]
struct Invocations(Arc<parking_lot::Mutex<Vec<Instant>>>);

impl Invocations {
    fn record(&self) {
        self.0.lock().push(Instant::now());
    }

    fn count(&self) -> usize {
        self.0.lock().len()
    }

    fn gaps(&self) -> Vec<Duration> {
        self.0
            .lock()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn always_failing_operation_runs_max_attempts_times() {
    let invocations = Invocations::default();
    let retry = Retry::new(
        "backendA",
        RetryConfig::builder()
            .max_attempts(2)
            .wait_duration(Duration::from_secs(1))
            .build()
            .unwrap(),
    );

    let inv = invocations.clone();
    let err = retry
        .execute(|| {
            inv.record();
            async { Err::<(), _>(ResilienceError::OperationFailed(TestError("io"))) }
        })
        .await
        .unwrap_err();

    assert_eq!(err, ResilienceError::OperationFailed(TestError("io")));
    assert_eq!(invocations.count(), 2);
    assert_eq!(invocations.gaps(), vec![Duration::from_secs(1)]);
}

#[tokio::test(start_paused = true)]
async fn backoff_pauses_are_deterministic() {
    let invocations = Invocations::default();
    let retry = Retry::new(
        "backendA",
        RetryConfig::builder()
            .max_attempts(4)
            .interval_function(
                ExponentialBackoff::new(Duration::from_millis(100))
                    .multiplier(3.0)
                    .max_interval(Duration::from_millis(500)),
            )
            .build()
            .unwrap(),
    );

    let inv = invocations.clone();
    let _ = retry
        .execute(|| {
            inv.record();
            async { Err::<(), _>(ResilienceError::OperationFailed(TestError("io"))) }
        })
        .await;

    assert_eq!(
        invocations.gaps(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(300),
            Duration::from_millis(500),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn ignored_kinds_take_precedence_over_retry_kinds() {
    let invocations = Invocations::default();
    let retry = Retry::new(
        "backendA",
        RetryConfig::builder()
            .max_attempts(5)
            .wait_duration(Duration::from_millis(10))
            .retry_on_kind(ErrorKind::new("http"))
            .ignore_kind(ErrorKind::new("http.client"))
            .build()
            .unwrap(),
    );

    let inv = invocations.clone();
    let err = retry
        .execute(|| {
            inv.record();
            async {
                Err::<(), _>(ResilienceError::OperationFailed(TestError(
                    "http.client.not_found",
                )))
            }
        })
        .await
        .unwrap_err();
    assert!(err.is_operation_failure());
    assert_eq!(invocations.count(), 1);

    let inv = Invocations::default();
    let i = inv.clone();
    let _ = retry
        .execute(|| {
            i.record();
            async { Err::<(), _>(ResilienceError::OperationFailed(TestError("http.server"))) }
        })
        .await;
    assert_eq!(inv.count(), 5);
}

#[tokio::test(start_paused = true)]
async fn kinds_outside_retry_set_propagate_immediately() {
    let invocations = Invocations::default();
    let retry = Retry::new(
        "backendA",
        RetryConfig::<(), TestError>::builder()
            .retry_on_kind(ErrorKind::TIMEOUT)
            .build()
            .unwrap(),
    );

    let inv = invocations.clone();
    let err = retry
        .execute(|| {
            inv.record();
            async {
                Err::<(), _>(ResilienceError::CallRejected(Rejection::CircuitOpen {
                    name: "cb".to_string(),
                    forced: false,
                }))
            }
        })
        .await
        .unwrap_err();
    assert!(err.is_rejected());
    assert_eq!(invocations.count(), 1);
}

#[tokio::test(start_paused = true)]
async fn result_predicate_retries_soft_failures() {
    let invocations = Invocations::default();
    let retry = Retry::new(
        "backendA",
        RetryConfig::builder()
            .max_attempts(3)
            .wait_duration(Duration::from_millis(10))
            .retry_on_result(|status: &u16| *status == 503)
            .build()
            .unwrap(),
    );

    let inv = invocations.clone();
    let status: Outcome<u16> = retry
        .execute(|| {
            inv.record();
            let status = if inv.count() < 3 { 503 } else { 200 };
            async move { Ok(status) }
        })
        .await;
    assert_eq!(status, Ok(200));
    assert_eq!(invocations.count(), 3);
}

#[tokio::test(start_paused = true)]
async fn layer_retries_cloned_requests() {
    let invocations = Invocations::default();
    let retry = Arc::new(Retry::new(
        "backendA",
        RetryConfig::builder()
            .max_attempts(3)
            .wait_duration(Duration::from_millis(50))
            .build()
            .unwrap(),
    ));

    let inv = invocations.clone();
    let service = RetryLayer::new(retry).layer(service_fn(move |name: String| {
        inv.record();
        let attempt = inv.count();
        async move {
            if attempt < 2 {
                Err(ResilienceError::OperationFailed(TestError("io")))
            } else {
                Ok(format!("hello {name}"))
            }
        }
    }));

    assert_eq!(service.oneshot("world".to_string()).await.unwrap(), "hello world");
    assert_eq!(invocations.count(), 2);
}
