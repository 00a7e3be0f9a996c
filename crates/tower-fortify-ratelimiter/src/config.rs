use crate::events::RateLimiterEvent;
use std::time::Duration;
use tower_fortify_core::{
    ConfigError, EventListener, EventListeners, FnListener, SharedClock, TokioClock,
};

/// Configuration for the rate limiter pattern.
#[derive(Clone, Debug)]
pub struct RateLimiterConfig {
    pub(crate) limit_for_period: usize,
    pub(crate) limit_refresh_period: Duration,
    pub(crate) timeout_duration: Duration,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) clock: SharedClock,
}

impl RateLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }

    /// Permits granted per refresh period.
    pub fn limit_for_period(&self) -> usize {
        self.limit_for_period
    }

    /// Length of one refresh period.
    pub fn limit_refresh_period(&self) -> Duration {
        self.limit_refresh_period
    }

    /// How long a caller may wait for a permit.
    pub fn timeout_duration(&self) -> Duration {
        self.timeout_duration
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        RateLimiterConfigBuilder::new().into_config()
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    limit_for_period: usize,
    limit_refresh_period: Duration,
    timeout_duration: Duration,
    event_listeners: EventListeners<RateLimiterEvent>,
    clock: SharedClock,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with default values.
    ///
    /// Defaults:
    /// - limit_for_period: 50
    /// - limit_refresh_period: 1 second
    /// - timeout_duration: 100ms
    pub fn new() -> Self {
        Self {
            limit_for_period: 50,
            limit_refresh_period: Duration::from_secs(1),
            timeout_duration: Duration::from_millis(100),
            event_listeners: EventListeners::new(),
            clock: TokioClock::shared(),
        }
    }

    /// Sets the maximum number of permits available per refresh period.
    ///
    /// Setting this to 100 with a refresh period of 1 second allows 100
    /// calls per second.
    pub fn limit_for_period(mut self, limit: usize) -> Self {
        self.limit_for_period = limit;
        self
    }

    /// Sets the duration of the refresh period.
    ///
    /// After each period, the available permits are reset to `limit_for_period`.
    pub fn limit_refresh_period(mut self, period: Duration) -> Self {
        self.limit_refresh_period = period;
        self
    }

    /// Sets how long a caller waits for a permit.
    ///
    /// If the next refresh lies beyond this timeout, the call is rejected
    /// immediately instead of waiting in vain.
    pub fn timeout_duration(mut self, duration: Duration) -> Self {
        self.timeout_duration = duration;
        self
    }

    /// Sets the time source used for period accounting.
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a listener for every rate limiter event.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<RateLimiterEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback when a permit is granted.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - Called with how long the caller waited for the permit.
    /// Zero when a permit was available immediately.
    pub fn on_permit_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitAcquired { wait_duration, .. } = event {
                f(*wait_duration);
            }
        }));
        self
    }

    /// Registers a callback when a caller is refused.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - Called with the timeout the caller was prepared to wait.
    pub fn on_permit_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitRejected { timeout_duration, .. } = event {
                f(*timeout_duration);
            }
        }));
        self
    }

    /// Registers a callback when the permits are reset for a new period.
    pub fn on_permits_refreshed<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::PermitsRefreshed {
                available_permits, ..
            } = event
            {
                f(*available_permits);
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<RateLimiterConfig, ConfigError> {
        ConfigError::require_positive("limit_for_period", self.limit_for_period)?;
        ConfigError::require_nonzero_duration("limit_refresh_period", self.limit_refresh_period)?;
        Ok(self.into_config())
    }

    fn into_config(self) -> RateLimiterConfig {
        RateLimiterConfig {
            limit_for_period: self.limit_for_period,
            limit_refresh_period: self.limit_refresh_period,
            timeout_duration: self.timeout_duration,
            event_listeners: self.event_listeners,
            clock: self.clock,
        }
    }
}
