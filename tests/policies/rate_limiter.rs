use super::TestError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tower::{service_fn, Layer, ServiceExt};
use tower_fortify_core::{ErrorKind, Rejection, ResilienceError};
use tower_fortify_ratelimiter::{RateLimiter, RateLimiterConfig, RateLimiterLayer};

fn limiter(limit: usize, period: Duration, timeout: Duration) -> Arc<RateLimiter> {
    Arc::new(RateLimiter::new(
        "backendA",
        RateLimiterConfig::builder()
            .limit_for_period(limit)
            .limit_refresh_period(period)
            .timeout_duration(timeout)
            .build()
            .unwrap(),
    ))
}

#[tokio::test(start_paused = true)]
async fn second_call_in_period_is_rejected_after_timeout() {
    let rejected = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&rejected);
    let limiter = Arc::new(RateLimiter::new(
        "backendA",
        RateLimiterConfig::builder()
            .limit_refresh_period(Duration::from_secs(1))
            .limit_for_period(1)
            .timeout_duration(Duration::from_millis(500))
            .on_permit_rejected(move |_| {
                r.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    ));

    assert_eq!(limiter.acquire_permission().await, Ok(Duration::ZERO));

    let start = Instant::now();
    let result = limiter.acquire_permission().await;
    assert_eq!(
        result,
        Err(Rejection::RateLimited {
            name: "backendA".to_string(),
            timeout: Duration::from_millis(500),
        })
    );
    assert!(start.elapsed() <= Duration::from_millis(500));
    assert_eq!(rejected.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn waiting_caller_gets_the_next_period() {
    let limiter = limiter(1, Duration::from_secs(1), Duration::from_millis(500));
    limiter.acquire_permission().await.unwrap();

    tokio::time::advance(Duration::from_millis(700)).await;

    // The next refresh is 300ms away, inside the 500ms budget.
    let waited = limiter.acquire_permission().await.unwrap();
    assert_eq!(waited, Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn permits_refresh_once_per_period() {
    let limiter = limiter(3, Duration::from_millis(100), Duration::ZERO);

    for _ in 0..3 {
        assert!(limiter.try_acquire_permission());
    }
    assert!(!limiter.try_acquire_permission());

    // Several idle periods still yield a single refill.
    tokio::time::advance(Duration::from_millis(350)).await;
    assert_eq!(limiter.available_permits(), 3);
    for _ in 0..3 {
        assert!(limiter.try_acquire_permission());
    }
    assert!(!limiter.try_acquire_permission());

    tokio::time::advance(Duration::from_millis(50)).await;
    assert!(limiter.try_acquire_permission());
}

#[tokio::test(start_paused = true)]
async fn layer_rejects_without_calling_the_service() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    let limiter = limiter(2, Duration::from_secs(1), Duration::ZERO);
    let service = RateLimiterLayer::new(Arc::clone(&limiter)).layer(service_fn(move |n: u32| {
        c.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, ResilienceError<TestError>>(n) }
    }));

    assert_eq!(service.clone().oneshot(1).await.unwrap(), 1);
    assert_eq!(service.clone().oneshot(2).await.unwrap(), 2);
    let err = service.oneshot(3).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RATE_LIMITED);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_the_period_budget() {
    let limiter = limiter(5, Duration::from_secs(1), Duration::ZERO);
    let mut handles = Vec::new();
    for _ in 0..20 {
        let limiter = Arc::clone(&limiter);
        handles.push(tokio::spawn(async move { limiter.try_acquire_permission() }));
    }

    let mut granted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            granted += 1;
        }
    }
    assert_eq!(granted, 5);
}
