//! Property tests for the rate limiter.
//!
//! Invariants tested:
//! - No refresh period grants more than limit_for_period permits
//! - Permits are restored once a full period has elapsed

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower_fortify_core::{Clock, ManualClock};
use tower_fortify_ratelimiter::{RateLimiter, RateLimiterConfig};

fn limiter(limit: usize, period: Duration, clock: Arc<ManualClock>) -> RateLimiter {
    RateLimiter::new(
        "prop",
        RateLimiterConfig::builder()
            .limit_for_period(limit)
            .limit_refresh_period(period)
            .timeout_duration(Duration::ZERO)
            .clock(clock)
            .build()
            .unwrap(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: no refresh period grants more than the limit
    #[test]
    fn grants_per_period_never_exceed_limit(
        limit in 1usize..=10,
        period_ms in 10u64..=1000,
        steps in prop::collection::vec(0u64..=200, 1..200),
    ) {
        let period = Duration::from_millis(period_ms);
        let clock = Arc::new(ManualClock::new());
        let origin = clock.now();
        let limiter = limiter(limit, period, Arc::clone(&clock));

        let mut per_period: HashMap<u128, usize> = HashMap::new();
        for step in steps {
            clock.advance(Duration::from_millis(step));
            if limiter.try_acquire_permission() {
                let cycle = clock.now().duration_since(origin).as_nanos() / period.as_nanos();
                *per_period.entry(cycle).or_default() += 1;
            }
        }

        for (cycle, granted) in per_period {
            prop_assert!(
                granted <= limit,
                "{} permits granted in period {}, limit {}",
                granted,
                cycle,
                limit
            );
        }
    }

    /// Property: after a full idle period the whole limit is available again
    #[test]
    fn full_limit_returns_after_one_period(
        limit in 1usize..=20,
        used in 0usize..=20,
        period_ms in 10u64..=1000,
    ) {
        let period = Duration::from_millis(period_ms);
        let clock = Arc::new(ManualClock::new());
        let limiter = limiter(limit, period, Arc::clone(&clock));

        for _ in 0..used.min(limit) {
            prop_assert!(limiter.try_acquire_permission());
        }
        prop_assert_eq!(limiter.available_permits(), limit - used.min(limit));

        clock.advance(period);
        prop_assert_eq!(limiter.available_permits(), limit);
    }
}
