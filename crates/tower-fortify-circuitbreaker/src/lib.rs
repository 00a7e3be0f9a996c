//! Circuit breaker for Tower services.
//!
//! A circuit breaker stops calling a dependency that keeps failing. It keeps
//! a count-based sliding window of the most recent call outcomes and opens
//! once the window is full and the failure rate (or slow-call rate) reaches
//! its threshold.
//!
//! ## States
//! - **Closed**: calls flow; outcomes are recorded
//! - **Open**: calls are rejected until `wait_duration_in_open` elapses
//! - **Half-Open**: a fixed number of probe calls decide between Closed and Open
//! - **Disabled**: calls flow; nothing is recorded
//! - **Forced-Open**: calls are rejected until an operator closes the breaker
//!
//! Open-state expiry is evaluated lazily: the first permission request after
//! the wait elapses moves the breaker to Half-Open. No background timer runs.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tower_fortify_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
//!
//! let config = CircuitBreakerConfig::builder()
//!     .failure_rate_threshold(50.0)
//!     .sliding_window_size(2)
//!     .wait_duration_in_open(Duration::from_secs(1))
//!     .build()
//!     .unwrap();
//! let breaker = Arc::new(CircuitBreaker::new("backendA", config));
//!
//! let permit = breaker.try_acquire_permission().unwrap();
//! breaker.on_error(permit, Duration::ZERO, tower_fortify_core::ErrorKind::new("io"));
//! let permit = breaker.try_acquire_permission().unwrap();
//! breaker.on_success(permit, Duration::ZERO);
//! assert_eq!(breaker.state(), CircuitState::Open);
//! assert!(breaker.try_acquire_permission().is_none());
//! ```
//!
//! Wrap a Tower service with [`CircuitBreakerLayer`]. The inner service must
//! already report failures as [`ResilienceError`] so their [`ErrorKind`] can be
//! inspected.
//!
//! ## Feature Flags
//! - `metrics`: call, transition and slow-call counters plus a state gauge
//! - `tracing`: state transitions and rejections are logged
//! - `serde`: `Serialize`/`Deserialize` for [`CircuitState`]

use crate::circuit::{Circuit, Verdict};
#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
#[cfg(feature = "metrics")]
use std::sync::Once;
use std::time::Duration;
use tower_fortify_core::{Classify, Clock, ErrorKind, Policy, Rejection, ResilienceError};

pub use circuit::{CallPermit, CircuitBreakerMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
pub use layer::{CircuitBreakerLayer, CircuitBreakerService};
pub use window::{CallOutcome, SlidingWindowMetrics};

mod circuit;
mod config;
mod events;
mod layer;
pub mod window;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

#[cfg(feature = "metrics")]
fn describe_metrics() {
    METRICS_INIT.call_once(|| {
        describe_counter!(
            "circuitbreaker_calls_total",
            "Total number of calls through the circuit breaker"
        );
        describe_counter!(
            "circuitbreaker_transitions_total",
            "Total number of circuit breaker state transitions"
        );
        describe_counter!(
            "circuitbreaker_slow_calls_total",
            "Total number of slow calls detected"
        );
        describe_gauge!(
            "circuitbreaker_state",
            "Current state of the circuit breaker"
        );
        describe_histogram!(
            "circuitbreaker_call_duration_seconds",
            "Duration of calls through the circuit breaker"
        );
    });
}

/// A named, shareable circuit breaker.
///
/// All methods take `&self`; share the breaker behind an `Arc`. Every state
/// change happens under one lock, so concurrent outcomes never lose updates
/// and exactly one caller performs each transition. Listeners run after the
/// lock is released.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
    state: AtomicU8,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        #[cfg(feature = "metrics")]
        describe_metrics();

        let now = config.clock.now();
        let circuit = Circuit::new(&config, now);
        Self {
            name: name.into(),
            config,
            circuit: Mutex::new(circuit),
            state: AtomicU8::new(CircuitState::Closed as u8),
        }
    }

    /// Creates a breaker with the default configuration.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// The breaker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The breaker's configuration.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// The current state, read without taking the lock.
    ///
    /// An Open breaker whose wait has elapsed still reports Open until the
    /// next permission request.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Asks for permission to make one call.
    ///
    /// A granted [`CallPermit`] obliges the caller to report the outcome with
    /// [`on_success`](Self::on_success) / [`on_error`](Self::on_error), or to
    /// hand it back with [`release_permission`](Self::release_permission).
    pub fn try_acquire_permission(&self) -> Option<CallPermit> {
        self.acquire_permission().ok()
    }

    /// Like [`try_acquire_permission`](Self::try_acquire_permission), but
    /// reports a refusal as a [`Rejection::CircuitOpen`].
    pub fn acquire_permission(&self) -> Result<CallPermit, Rejection> {
        self.with_circuit(|circuit, config, now, events| {
            circuit.try_acquire(&self.name, config, now, events)
        })
        .map(CallPermit::new)
        .map_err(|refused_in| Rejection::CircuitOpen {
            name: self.name.clone(),
            forced: refused_in == CircuitState::ForcedOpen,
        })
    }

    /// Hands back a permission whose call will never report an outcome.
    pub fn release_permission(&self, permit: CallPermit) {
        self.circuit.lock().release(permit.generation());
    }

    /// Records a successful call.
    pub fn on_success(&self, permit: CallPermit, duration: Duration) {
        self.record(permit, Verdict::Success, duration);
    }

    /// Records a failed call of the given kind.
    ///
    /// Ignored kinds are left out of the accounting. When record kinds are
    /// configured, a failure matching none of them counts as a success.
    pub fn on_error(&self, permit: CallPermit, duration: Duration, kind: ErrorKind) {
        let verdict = if kind.is_any_of(&self.config.ignored_kinds) {
            Verdict::Ignored(kind)
        } else if self.config.record_kinds.is_empty() || kind.is_any_of(&self.config.record_kinds) {
            Verdict::Failure(kind)
        } else {
            Verdict::Success
        };
        self.record(permit, verdict, duration);
    }

    /// Records the outcome of a call that returned `result`.
    pub fn on_result<T, E: Classify>(
        &self,
        permit: CallPermit,
        duration: Duration,
        result: &Result<T, E>,
    ) {
        match result {
            Ok(_) => self.on_success(permit, duration),
            Err(e) => self.on_error(permit, duration, e.kind()),
        }
    }

    /// Runs `operation` under this breaker.
    ///
    /// The operation is not started when permission is refused.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, ResilienceError<E>>>,
        E: Classify,
    {
        let guard = layer::PermitGuard::new(self, self.acquire_permission()?);
        let start = self.config.clock.now();
        let result = operation().await;
        let duration = self.config.clock.now().saturating_duration_since(start);
        guard.report(duration, &result);
        result
    }

    /// Stops recording; every call is permitted until another transition.
    pub fn transition_to_disabled(&self) {
        self.transition(CircuitState::Disabled);
    }

    /// Rejects every call until another transition; timers do not apply.
    pub fn transition_to_forced_open(&self) {
        self.transition(CircuitState::ForcedOpen);
    }

    /// Closes the breaker with an empty window.
    pub fn transition_to_closed(&self) {
        self.transition(CircuitState::Closed);
    }

    /// Returns to a fresh Closed state, clearing all recorded outcomes.
    pub fn reset(&self) {
        self.transition(CircuitState::Closed);
    }

    /// A snapshot of the breaker's accounting.
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let now = self.config.clock.now();
        self.circuit.lock().metrics(now)
    }

    fn transition(&self, to: CircuitState) {
        self.with_circuit(|circuit, _, now, events| {
            circuit.transition_to(to, &self.name, now, events)
        })
    }

    fn record(&self, permit: CallPermit, verdict: Verdict, duration: Duration) {
        self.with_circuit(|circuit, config, now, events| {
            circuit.record(
                verdict,
                permit.generation(),
                duration,
                &self.name,
                config,
                now,
                events,
            )
        })
    }

    fn with_circuit<R>(
        &self,
        f: impl FnOnce(
            &mut Circuit,
            &CircuitBreakerConfig,
            tokio::time::Instant,
            &mut Vec<CircuitBreakerEvent>,
        ) -> R,
    ) -> R {
        let mut events = Vec::new();
        let result = {
            let mut circuit = self.circuit.lock();
            let now = self.config.clock.now();
            let result = f(&mut *circuit, &self.config, now, &mut events);
            self.state.store(circuit.state() as u8, Ordering::Release);
            result
        };
        self.publish(&events);
        result
    }

    fn publish(&self, events: &[CircuitBreakerEvent]) {
        for event in events {
            #[cfg(feature = "tracing")]
            self.log(event);
            #[cfg(feature = "metrics")]
            self.record_metrics(event);
            self.config.event_listeners.emit(event);
        }
    }

    #[cfg(feature = "tracing")]
    fn log(&self, event: &CircuitBreakerEvent) {
        match event {
            CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } => tracing::info!(
                breaker = %self.name,
                from = from_state.as_str(),
                to = to_state.as_str(),
                "circuit breaker state transition"
            ),
            CircuitBreakerEvent::CallRejected { state, .. } => tracing::debug!(
                breaker = %self.name,
                state = state.as_str(),
                "circuit breaker rejected call"
            ),
            CircuitBreakerEvent::SlowCallDetected { duration, .. } => tracing::debug!(
                breaker = %self.name,
                ?duration,
                "slow call detected"
            ),
            _ => {}
        }
    }

    #[cfg(feature = "metrics")]
    fn record_metrics(&self, event: &CircuitBreakerEvent) {
        let name = self.name.clone();
        match event {
            CircuitBreakerEvent::StateTransition {
                from_state,
                to_state,
                ..
            } => {
                counter!(
                    "circuitbreaker_transitions_total",
                    "circuitbreaker" => name.clone(),
                    "from" => from_state.as_str(),
                    "to" => to_state.as_str()
                )
                .increment(1);
                gauge!("circuitbreaker_state", "circuitbreaker" => name).set(*to_state as u8 as f64);
            }
            CircuitBreakerEvent::CallRejected { .. } => {
                counter!("circuitbreaker_calls_total", "circuitbreaker" => name, "outcome" => "rejected")
                    .increment(1);
            }
            CircuitBreakerEvent::SuccessRecorded { duration, .. } => {
                counter!("circuitbreaker_calls_total", "circuitbreaker" => name.clone(), "outcome" => "success")
                    .increment(1);
                histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => name)
                    .record(duration.as_secs_f64());
            }
            CircuitBreakerEvent::ErrorRecorded { duration, .. } => {
                counter!("circuitbreaker_calls_total", "circuitbreaker" => name.clone(), "outcome" => "failure")
                    .increment(1);
                histogram!("circuitbreaker_call_duration_seconds", "circuitbreaker" => name)
                    .record(duration.as_secs_f64());
            }
            CircuitBreakerEvent::IgnoredError { .. } => {
                counter!("circuitbreaker_calls_total", "circuitbreaker" => name, "outcome" => "ignored")
                    .increment(1);
            }
            CircuitBreakerEvent::SlowCallDetected { .. } => {
                counter!("circuitbreaker_slow_calls_total", "circuitbreaker" => name).increment(1);
            }
            CircuitBreakerEvent::CallPermitted { .. } => {}
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

impl Policy for CircuitBreaker {
    type Config = CircuitBreakerConfig;

    fn from_config(name: &str, config: CircuitBreakerConfig) -> Self {
        CircuitBreaker::new(name, config)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
