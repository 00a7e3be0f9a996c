use super::TestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::{service_fn, Layer, ServiceExt};
use tower_fortify_bulkhead::{
    Bulkhead, BulkheadConfig, BulkheadLayer, ThreadPoolBulkhead, ThreadPoolBulkheadConfig,
    ThreadPoolBulkheadLayer,
};
use tower_fortify_core::{ErrorKind, Rejection, ResilienceError};

fn single_slot(max_wait: Duration) -> Arc<Bulkhead> {
    Arc::new(Bulkhead::new(
        "backendA",
        BulkheadConfig::builder()
            .max_concurrent_calls(1)
            .max_wait_duration(max_wait)
            .build()
            .unwrap(),
    ))
}

/// A service that holds its slot for `hold` and tracks peak concurrency.
fn tracked(
    hold: Duration,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
) -> impl tower::Service<
    (),
    Response = (),
    Error = ResilienceError<TestError>,
    Future = impl Future<Output = Result<(), ResilienceError<TestError>>> + Send,
> + Clone + Send {
    service_fn(move |_: ()| {
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            active.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn second_caller_waits_for_the_first() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let bulkhead = single_slot(Duration::from_secs(1));
    let service = BulkheadLayer::new(Arc::clone(&bulkhead)).layer(tracked(
        Duration::from_millis(400),
        Arc::clone(&active),
        Arc::clone(&peak),
    ));

    let start = Instant::now();
    let first = tokio::spawn(service.clone().oneshot(()));
    tokio::task::yield_now().await;
    let second = tokio::spawn(service.oneshot(()));

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(800) && elapsed < Duration::from_secs(1));
    assert_eq!(bulkhead.available_permits(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_caller_is_rejected_after_max_wait() {
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let bulkhead = single_slot(Duration::from_secs(1));
    let service = BulkheadLayer::new(Arc::clone(&bulkhead)).layer(tracked(
        Duration::from_secs(3),
        Arc::clone(&active),
        Arc::clone(&peak),
    ));

    let first = tokio::spawn(service.clone().oneshot(()));
    tokio::task::yield_now().await;

    let start = Instant::now();
    let err = service.oneshot(()).await.unwrap_err();
    let waited = start.elapsed();
    assert!(waited >= Duration::from_secs(1) && waited < Duration::from_secs(2));
    assert_eq!(
        err,
        ResilienceError::CallRejected(Rejection::BulkheadFull {
            name: "backendA".to_string(),
            max_concurrent_calls: 1,
        })
    );
    assert_eq!(err.kind(), ErrorKind::BULKHEAD_FULL);

    first.await.unwrap().unwrap();
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn permit_is_released_when_the_caller_gives_up() {
    let bulkhead = single_slot(Duration::ZERO);
    let service = BulkheadLayer::new(Arc::clone(&bulkhead)).layer(service_fn(|_: ()| async {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, ResilienceError<TestError>>(())
    }));

    let outcome = tokio::time::timeout(Duration::from_millis(10), service.oneshot(())).await;
    assert!(outcome.is_err());
    assert_eq!(bulkhead.concurrent_calls(), 0);
    assert!(bulkhead.try_acquire_permission().is_some());
}

#[tokio::test]
async fn permit_is_released_on_failure() {
    let bulkhead = single_slot(Duration::ZERO);
    let service = BulkheadLayer::new(Arc::clone(&bulkhead)).layer(service_fn(|_: ()| async {
        Err::<(), _>(ResilienceError::OperationFailed(TestError("io")))
    }));

    for _ in 0..3 {
        let err = service.clone().oneshot(()).await.unwrap_err();
        assert!(err.is_operation_failure());
    }
    assert_eq!(bulkhead.available_permits(), 1);
}

#[tokio::test(start_paused = true)]
async fn pool_never_exceeds_its_size_or_queue() {
    let pool = Arc::new(ThreadPoolBulkhead::new(
        "workers",
        ThreadPoolBulkheadConfig::builder()
            .core_threads(1)
            .max_threads(2)
            .queue_capacity(2)
            .build()
            .unwrap(),
    ));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let service = ThreadPoolBulkheadLayer::new(Arc::clone(&pool)).layer(tracked(
        Duration::from_millis(100),
        Arc::clone(&active),
        Arc::clone(&peak),
    ));

    // Two running plus two queued fit; the fifth is refused at once.
    let mut accepted = Vec::new();
    for _ in 0..4 {
        accepted.push(tokio::spawn(service.clone().oneshot(())));
    }
    tokio::task::yield_now().await;
    assert!(pool.running() <= 2);
    assert!(pool.queue_depth() <= 2);

    let start = Instant::now();
    let err = service.clone().oneshot(()).await.unwrap_err();
    assert!(start.elapsed() < Duration::from_millis(1));
    assert_eq!(err.kind(), ErrorKind::BULKHEAD_FULL);

    for handle in accepted {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 2);
    assert_eq!(pool.running(), 0);
}

#[tokio::test]
async fn pool_handle_yields_the_job_output() {
    let pool = ThreadPoolBulkhead::new("workers", ThreadPoolBulkheadConfig::default());
    let handle = pool.submit(async { 6 * 7 }).unwrap();
    assert_eq!(handle.await.unwrap(), 42);
}
