//! Property tests for the retry policy.
//!
//! Invariants tested:
//! - The operation is invoked at most max_attempts times
//! - Retry stops on the first success
//! - The pause before each attempt is exactly what the interval function says

use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder;
use tower_fortify_core::{Classify, ErrorKind, ResilienceError};
use tower_fortify_retry::{ExponentialBackoff, IntervalFunction, Retry, RetryConfig};

#[derive(Debug, Clone, PartialEq)]
struct Flaky;

impl Classify for Flaky {
    fn kind(&self) -> ErrorKind {
        ErrorKind::new("flaky")
    }
}

fn paused_runtime() -> tokio::runtime::Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: calls = min(failures + 1, max_attempts)
    #[test]
    fn retry_respects_max_attempts(
        max_attempts in 1usize..=10,
        failures_before_success in 0usize..=15,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let calls = Arc::new(AtomicUsize::new(0));
            let retry = Retry::new(
                "prop",
                RetryConfig::builder()
                    .max_attempts(max_attempts)
                    .wait_duration(Duration::from_millis(5))
                    .build()
                    .unwrap(),
            );

            let c = Arc::clone(&calls);
            let result = retry
                .execute(|| {
                    let n = c.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < failures_before_success {
                            Err(ResilienceError::OperationFailed(Flaky))
                        } else {
                            Ok(n)
                        }
                    }
                })
                .await;

            let expected = (failures_before_success + 1).min(max_attempts);
            prop_assert_eq!(calls.load(Ordering::SeqCst), expected);
            prop_assert_eq!(result.is_ok(), failures_before_success < max_attempts);
            Ok(())
        })?;
    }

    /// Property: total time spent equals the sum of the configured pauses
    #[test]
    fn pauses_follow_the_interval_function(
        max_attempts in 1usize..=6,
        initial_ms in 1u64..=100,
        multiplier in 1.0f64..=3.0,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let backoff = ExponentialBackoff::new(Duration::from_millis(initial_ms))
                .multiplier(multiplier);
            let expected: Duration = (0..max_attempts.saturating_sub(1))
                .map(|retry| backoff.next_interval(retry))
                .sum();

            let retry = Retry::new(
                "prop",
                RetryConfig::builder()
                    .max_attempts(max_attempts)
                    .interval_function(backoff)
                    .build()
                    .unwrap(),
            );

            let start = tokio::time::Instant::now();
            let result: Result<(), _> = retry
                .execute(|| async { Err(ResilienceError::OperationFailed(Flaky)) })
                .await;
            prop_assert!(result.is_err());

            let elapsed = start.elapsed();
            // Timers resolve at millisecond granularity.
            prop_assert!(elapsed >= expected);
            prop_assert!(elapsed <= expected + Duration::from_millis(max_attempts as u64));
            Ok(())
        })?;
    }
}
