//! Delay between attempts.

use std::fmt;
use std::time::Duration;

/// Computes the pause before a retry.
///
/// `retry` counts retries, starting at 0: the pause before the second attempt
/// is `next_interval(0)`, before the third `next_interval(1)`, and so on.
/// Implementations other than [`ExponentialRandomBackoff`] must be
/// deterministic in `retry`.
pub trait IntervalFunction: Send + Sync {
    /// The pause before retry number `retry`.
    fn next_interval(&self, retry: usize) -> Duration;
}

/// The same pause before every retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Pauses `duration` before every retry.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _retry: usize) -> Duration {
        self.duration
    }
}

/// `initial * multiplier^retry`, optionally capped.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Doubles the pause after every retry, starting at `initial_interval`.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the growth factor.
    ///
    /// Default: 2.0
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Caps the pause at `max_interval`.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let uncapped = if factor.is_finite() {
            Duration::try_from_secs_f64(self.initial_interval.as_secs_f64() * factor)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::MAX
        };
        match self.max_interval {
            Some(max) => uncapped.min(max),
            None => uncapped,
        }
    }
}

/// [`ExponentialBackoff`] with uniform jitter of `± randomization_factor`.
///
/// A factor of 0.5 spreads each pause between 50% and 150% of the
/// exponential value. Jitter is applied after the cap.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialRandomBackoff {
    base: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    /// Creates a jittered exponential backoff. The factor is clamped to `[0, 1]`.
    pub fn new(initial_interval: Duration, randomization_factor: f64) -> Self {
        Self {
            base: ExponentialBackoff::new(initial_interval),
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
        }
    }

    /// Sets the growth factor.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.base = self.base.multiplier(multiplier);
        self
    }

    /// Caps the pause before jitter.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.base = self.base.max_interval(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, retry: usize) -> Duration {
        use rand::Rng;

        let center = self.base.next_interval(retry).as_secs_f64();
        let delta = center * self.randomization_factor;
        if delta <= 0.0 || !delta.is_finite() {
            return self.base.next_interval(retry);
        }
        let jittered = rand::rng().random_range((center - delta)..=(center + delta));
        Duration::try_from_secs_f64(jittered.max(0.0)).unwrap_or(Duration::MAX)
    }
}

/// Wraps a closure as an [`IntervalFunction`].
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Uses `f(retry)` as the pause.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, retry: usize) -> Duration {
        (self.f)(retry)
    }
}

impl<F> fmt::Debug for FnInterval<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterval").finish_non_exhaustive()
    }
}
