use crate::events::CircuitBreakerEvent;
use crate::CircuitState;
use std::time::Duration;
use tower_fortify_core::{
    ConfigError, ErrorKind, EventListener, EventListeners, FnListener, SharedClock, TokioClock,
};

/// Configuration for a circuit breaker.
///
/// Thresholds are percentages in `(0, 100]`. Built through
/// [`CircuitBreakerConfig::builder`], which validates every field.
#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    pub(crate) failure_rate_threshold: f64,
    pub(crate) slow_call_rate_threshold: f64,
    pub(crate) slow_call_duration_threshold: Duration,
    pub(crate) sliding_window_size: usize,
    pub(crate) wait_duration_in_open: Duration,
    pub(crate) permitted_calls_in_half_open: usize,
    pub(crate) ignored_kinds: Vec<ErrorKind>,
    pub(crate) record_kinds: Vec<ErrorKind>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) clock: SharedClock,
}

impl CircuitBreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Failure rate (percent) at or above which the breaker opens.
    pub fn failure_rate_threshold(&self) -> f64 {
        self.failure_rate_threshold
    }

    /// Slow-call rate (percent) at or above which the breaker opens.
    pub fn slow_call_rate_threshold(&self) -> f64 {
        self.slow_call_rate_threshold
    }

    /// Duration at or above which a call counts as slow.
    pub fn slow_call_duration_threshold(&self) -> Duration {
        self.slow_call_duration_threshold
    }

    /// Number of outcomes held by the sliding window.
    pub fn sliding_window_size(&self) -> usize {
        self.sliding_window_size
    }

    /// How long the breaker stays open before probing.
    pub fn wait_duration_in_open(&self) -> Duration {
        self.wait_duration_in_open
    }

    /// Number of probe calls admitted per half-open episode.
    pub fn permitted_calls_in_half_open(&self) -> usize {
        self.permitted_calls_in_half_open
    }

    /// Failure kinds left out of the accounting entirely.
    pub fn ignored_kinds(&self) -> &[ErrorKind] {
        &self.ignored_kinds
    }

    /// Failure kinds counted as failures; empty means all of them.
    pub fn record_kinds(&self) -> &[ErrorKind] {
        &self.record_kinds
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        CircuitBreakerConfigBuilder::new().into_config()
    }
}

/// Builder for [`CircuitBreakerConfig`].
pub struct CircuitBreakerConfigBuilder {
    failure_rate_threshold: f64,
    slow_call_rate_threshold: f64,
    slow_call_duration_threshold: Duration,
    sliding_window_size: usize,
    wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,
    ignored_kinds: Vec<ErrorKind>,
    record_kinds: Vec<ErrorKind>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    clock: SharedClock,
}

impl Default for CircuitBreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CircuitBreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration_threshold: Duration::from_secs(60),
            sliding_window_size: 100,
            wait_duration_in_open: Duration::from_secs(60),
            permitted_calls_in_half_open: 10,
            ignored_kinds: Vec::new(),
            record_kinds: Vec::new(),
            event_listeners: EventListeners::new(),
            clock: TokioClock::shared(),
        }
    }

    /// Sets the failure rate, in percent, at which the circuit opens.
    ///
    /// Default: 50
    pub fn failure_rate_threshold(mut self, percent: f64) -> Self {
        self.failure_rate_threshold = percent;
        self
    }

    /// Sets the slow-call rate, in percent, at which the circuit opens.
    ///
    /// Default: 100
    pub fn slow_call_rate_threshold(mut self, percent: f64) -> Self {
        self.slow_call_rate_threshold = percent;
        self
    }

    /// Sets the duration at or above which a call counts as slow.
    ///
    /// Default: 60 seconds
    pub fn slow_call_duration_threshold(mut self, duration: Duration) -> Self {
        self.slow_call_duration_threshold = duration;
        self
    }

    /// Sets the number of most recent outcomes the rates are computed over.
    /// The breaker never opens before this many outcomes were recorded.
    ///
    /// Default: 100
    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_size = size;
        self
    }

    /// Sets how long the circuit stays open before admitting probe calls.
    ///
    /// Default: 60 seconds
    pub fn wait_duration_in_open(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open = duration;
        self
    }

    /// Sets the number of probe calls admitted while half-open. The
    /// half-open episode is evaluated once this many outcomes are recorded.
    ///
    /// Default: 10
    pub fn permitted_calls_in_half_open(mut self, n: usize) -> Self {
        self.permitted_calls_in_half_open = n;
        self
    }

    /// Adds a failure kind that is neither a success nor a failure. Such
    /// calls are left out of the sliding window entirely. Descendant kinds
    /// match too.
    pub fn ignore_kind(mut self, kind: ErrorKind) -> Self {
        self.ignored_kinds.push(kind);
        self
    }

    /// Adds several ignored kinds. See [`ignore_kind`](Self::ignore_kind).
    pub fn ignore_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = ErrorKind>,
    {
        self.ignored_kinds.extend(kinds);
        self
    }

    /// Restricts which failure kinds count as failures. Once any record
    /// kind is set, a failure matching none of them is recorded as a
    /// success. Ignored kinds take precedence.
    ///
    /// Default: empty (every non-ignored failure counts)
    pub fn record_kind(mut self, kind: ErrorKind) -> Self {
        self.record_kinds.push(kind);
        self
    }

    /// Adds several record kinds. See [`record_kind`](Self::record_kind).
    pub fn record_kinds<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = ErrorKind>,
    {
        self.record_kinds.extend(kinds);
        self
    }

    /// Sets the time source used for open-state expiry and call durations.
    ///
    /// Default: [`TokioClock`]
    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Registers a listener for every circuit breaker event.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: EventListener<CircuitBreakerEvent> + 'static,
    {
        self.event_listeners.add(listener);
        self
    }

    /// Registers a callback when the circuit breaker transitions between states.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState, CircuitState)` - called with the state being left
    /// and the state being entered.
    ///
    /// # Example
    /// ```rust
    /// use tower_fortify_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let config = CircuitBreakerConfig::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("circuit opened (was {:?})", from);
    ///         }
    ///     })
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } = event
            {
                f(*from_state, *to_state);
            }
        }));
        self
    }

    /// Registers a callback when a call is permitted.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState)` - the state that refused the call (`Open`,
    /// `ForcedOpen`, or `HalfOpen` with every probe permit taken).
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::CallRejected { state, .. } = event {
                f(*state);
            }
        }));
        self
    }

    /// Registers a callback when a success is recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::SuccessRecorded { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Registers a callback when a failure is recorded.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorKind, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::ErrorRecorded { kind, duration, .. } = event {
                f(*kind, *duration);
            }
        }));
        self
    }

    /// Registers a callback when a failure is ignored.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorKind) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::IgnoredError { kind, .. } = event {
                f(*kind);
            }
        }));
        self
    }

    /// Registers a callback when a slow call is recorded.
    pub fn on_slow_call<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CircuitBreakerEvent::SlowCallDetected { duration, .. } = event {
                f(*duration);
            }
        }));
        self
    }

    /// Validates the settings and builds the configuration.
    pub fn build(self) -> Result<CircuitBreakerConfig, ConfigError> {
        ConfigError::require_percentage("failure_rate_threshold", self.failure_rate_threshold)?;
        ConfigError::require_percentage("slow_call_rate_threshold", self.slow_call_rate_threshold)?;
        ConfigError::require_positive("sliding_window_size", self.sliding_window_size)?;
        ConfigError::require_positive(
            "permitted_calls_in_half_open",
            self.permitted_calls_in_half_open,
        )?;
        Ok(self.into_config())
    }

    fn into_config(self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            slow_call_rate_threshold: self.slow_call_rate_threshold,
            slow_call_duration_threshold: self.slow_call_duration_threshold,
            sliding_window_size: self.sliding_window_size,
            wait_duration_in_open: self.wait_duration_in_open,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            ignored_kinds: self.ignored_kinds,
            record_kinds: self.record_kinds,
            event_listeners: self.event_listeners,
            clock: self.clock,
        }
    }
}
