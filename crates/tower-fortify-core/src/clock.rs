//! Monotonic time source used by every policy.
//!
//! Policies never read the system clock directly. Open-state expiry and
//! rate-limiter refreshes are evaluated lazily against a [`Clock`] at call
//! time. The default [`TokioClock`] follows tokio's clock, which makes
//! paused-time tests (`#[tokio::test(start_paused = true)]`) deterministic.
//! [`ManualClock`] is advanced by hand and suits synchronous unit tests.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A monotonic time source.
pub trait Clock: Send + Sync + fmt::Debug {
    /// The current instant.
    fn now(&self) -> Instant;
}

/// Shared clock handle stored in policy configs.
pub type SharedClock = Arc<dyn Clock>;

/// Reads `tokio::time::Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

impl TokioClock {
    /// A shared handle to the tokio clock.
    pub fn shared() -> SharedClock {
        Arc::new(TokioClock)
    }
}

/// A clock that only moves when told to.
///
/// ```
/// use std::time::Duration;
/// use tower_fortify_core::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now() - start, Duration::from_secs(5));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    /// Total time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + *self.elapsed.lock()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}
