//! Rate limiting for Tower services.
//!
//! A [`RateLimiter`] grants at most `limit_for_period` permits per
//! `limit_refresh_period`. Permits are refilled lazily when the limiter is
//! consulted; no background task runs. A caller that finds no permit left
//! waits for the next refresh, unless that refresh lies beyond its timeout,
//! in which case it is rejected straight away.
//!
//! ## Basic Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower::{service_fn, ServiceBuilder};
//! use tower_fortify_core::ResilienceError;
//! use tower_fortify_ratelimiter::{RateLimiter, RateLimiterConfig, RateLimiterLayer};
//!
//! let config = RateLimiterConfig::builder()
//!     .limit_for_period(100)
//!     .limit_refresh_period(Duration::from_secs(1))
//!     .timeout_duration(Duration::from_millis(500))
//!     .build()
//!     .unwrap();
//! let limiter = Arc::new(RateLimiter::new("api", config));
//!
//! let service = ServiceBuilder::new()
//!     .layer(RateLimiterLayer::new(limiter))
//!     .service(service_fn(|req: String| async move {
//!         Ok::<_, ResilienceError<std::io::Error>>(req)
//!     }));
//! ```
//!
//! ## Feature Flags
//! - `metrics`: `ratelimiter_calls_total` counter and `ratelimiter_available_permits` gauge
//! - `tracing`: rejections and waits are logged

use crate::limiter::RateLimiterState;
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use parking_lot::Mutex;
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use tower_fortify_core::{Clock, Policy, Rejection};

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use events::RateLimiterEvent;
pub use layer::{RateLimiterLayer, RateLimiterService};

mod config;
mod events;
mod layer;
mod limiter;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

/// A named, shareable rate limiter.
pub struct RateLimiter {
    name: String,
    config: RateLimiterConfig,
    state: Mutex<RateLimiterState>,
}

impl RateLimiter {
    /// Creates a limiter whose first period starts now, with every permit available.
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "ratelimiter_calls_total",
                "Total number of rate limiter permit requests, by outcome"
            );
            describe_gauge!(
                "ratelimiter_available_permits",
                "Permits left in the current period"
            );
            describe_histogram!(
                "ratelimiter_wait_duration_seconds",
                "Time callers spent waiting for a permit"
            );
        });

        let state = RateLimiterState::new(
            config.limit_for_period,
            config.limit_refresh_period,
            config.clock.now(),
        );
        Self {
            name: name.into(),
            config,
            state: Mutex::new(state),
        }
    }

    /// The limiter's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The limiter's configuration.
    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Waits up to the configured timeout for a permit.
    ///
    /// Returns how long the caller waited.
    pub async fn acquire_permission(&self) -> Result<Duration, Rejection> {
        self.acquire_permission_within(self.config.timeout_duration)
            .await
    }

    /// Waits up to `timeout` for a permit.
    ///
    /// Returns how long the caller waited. Waiting follows tokio's timer.
    pub async fn acquire_permission_within(&self, timeout: Duration) -> Result<Duration, Rejection> {
        let start = self.config.clock.now();
        // A timeout past the end of the clock means waiting without a deadline.
        let deadline = start.checked_add(timeout);

        loop {
            let now = self.config.clock.now();
            match self.try_acquire_at(now) {
                Ok(()) => {
                    let waited = now.saturating_duration_since(start);
                    self.on_acquired(waited);
                    return Ok(waited);
                }
                Err(next_refresh) if deadline.is_some_and(|deadline| next_refresh > deadline) => {
                    return Err(self.on_rejected(timeout));
                }
                Err(next_refresh) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(limiter = %self.name, "waiting for the next refresh");
                    tokio::time::sleep(next_refresh.saturating_duration_since(now)).await;
                }
            }
        }
    }

    /// Takes a permit only if one is available right now.
    pub fn try_acquire_permission(&self) -> bool {
        match self.try_acquire_at(self.config.clock.now()) {
            Ok(()) => {
                self.on_acquired(Duration::ZERO);
                true
            }
            Err(_) => {
                self.on_rejected(Duration::ZERO);
                false
            }
        }
    }

    /// Permits left in the current period.
    pub fn available_permits(&self) -> usize {
        let now = self.config.clock.now();
        let (available, refreshed) = {
            let mut state = self.state.lock();
            let refreshed = state.refresh(now);
            (state.available_permits(), refreshed)
        };
        if refreshed {
            self.on_refreshed(available);
        }
        available
    }

    /// Discards the permits left in the current period.
    pub fn drain_permissions(&self) {
        let now = self.config.clock.now();
        let mut state = self.state.lock();
        state.refresh(now);
        state.drain();
    }

    fn try_acquire_at(&self, now: tokio::time::Instant) -> Result<(), tokio::time::Instant> {
        let (result, refreshed) = {
            let mut state = self.state.lock();
            let refreshed = state.refresh(now).then(|| state.available_permits());
            (state.try_acquire(), refreshed)
        };
        if let Some(available) = refreshed {
            self.on_refreshed(available);
        }
        result
    }

    fn on_acquired(&self, wait_duration: Duration) {
        #[cfg(feature = "metrics")]
        {
            counter!("ratelimiter_calls_total", "ratelimiter" => self.name.clone(), "result" => "permitted")
                .increment(1);
            histogram!("ratelimiter_wait_duration_seconds", "ratelimiter" => self.name.clone())
                .record(wait_duration.as_secs_f64());
            gauge!("ratelimiter_available_permits", "ratelimiter" => self.name.clone())
                .set(self.state.lock().available_permits() as f64);
        }

        self.config
            .event_listeners
            .emit(&RateLimiterEvent::PermitAcquired {
                pattern_name: self.name.clone(),
                timestamp: std::time::Instant::now(),
                wait_duration,
            });
    }

    fn on_rejected(&self, timeout_duration: Duration) -> Rejection {
        #[cfg(feature = "tracing")]
        tracing::debug!(limiter = %self.name, ?timeout_duration, "rate limit exceeded, call rejected");

        #[cfg(feature = "metrics")]
        counter!("ratelimiter_calls_total", "ratelimiter" => self.name.clone(), "result" => "rejected")
            .increment(1);

        self.config
            .event_listeners
            .emit(&RateLimiterEvent::PermitRejected {
                pattern_name: self.name.clone(),
                timestamp: std::time::Instant::now(),
                timeout_duration,
            });

        Rejection::RateLimited {
            name: self.name.clone(),
            timeout: timeout_duration,
        }
    }

    fn on_refreshed(&self, available_permits: usize) {
        #[cfg(feature = "metrics")]
        gauge!("ratelimiter_available_permits", "ratelimiter" => self.name.clone())
            .set(available_permits as f64);

        self.config
            .event_listeners
            .emit(&RateLimiterEvent::PermitsRefreshed {
                pattern_name: self.name.clone(),
                timestamp: std::time::Instant::now(),
                available_permits,
            });
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("limit_for_period", &self.config.limit_for_period)
            .field("limit_refresh_period", &self.config.limit_refresh_period)
            .finish()
    }
}

impl Policy for RateLimiter {
    type Config = RateLimiterConfig;

    fn from_config(name: &str, config: RateLimiterConfig) -> Self {
        RateLimiter::new(name, config)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
