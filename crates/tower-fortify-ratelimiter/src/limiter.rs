use std::time::Duration;
use tokio::time::Instant;

/// Permit accounting for one rate limiter.
///
/// Refresh is lazy: every operation first rolls the cycle forward by the
/// number of whole periods that elapsed, so permits are reset at most once
/// per period no matter how rarely the limiter is consulted.
#[derive(Debug)]
pub(crate) struct RateLimiterState {
    limit_for_period: usize,
    refresh_period: Duration,
    available_permits: usize,
    cycle_start: Instant,
}

impl RateLimiterState {
    pub(crate) fn new(limit_for_period: usize, refresh_period: Duration, now: Instant) -> Self {
        Self {
            limit_for_period,
            refresh_period,
            available_permits: limit_for_period,
            cycle_start: now,
        }
    }

    /// Starts a new cycle if at least one period elapsed. Returns true when
    /// the permits were reset.
    pub(crate) fn refresh(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.cycle_start);
        if elapsed < self.refresh_period {
            return false;
        }
        let into_cycle = elapsed.as_nanos() % self.refresh_period.as_nanos();
        self.cycle_start = now - Duration::from_nanos(into_cycle as u64);
        self.available_permits = self.limit_for_period;
        true
    }

    /// Takes a permit if one is left in the current cycle. Otherwise returns
    /// the instant of the next refresh.
    pub(crate) fn try_acquire(&mut self) -> Result<(), Instant> {
        if self.available_permits > 0 {
            self.available_permits -= 1;
            Ok(())
        } else {
            Err(self.next_refresh())
        }
    }

    pub(crate) fn next_refresh(&self) -> Instant {
        self.cycle_start + self.refresh_period
    }

    pub(crate) fn available_permits(&self) -> usize {
        self.available_permits
    }

    pub(crate) fn drain(&mut self) {
        self.available_permits = 0;
    }
}
