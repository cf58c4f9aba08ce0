//! Time abstraction for testability
//!
//! Code that reasons about sync windows, run leases, or rate-limit windows
//! takes a [`Clock`] so tests can pin or advance time without sleeping.
//!
//! ```
//! use std::time::Duration;
//!
//! use calbridge_common::time::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_secs(5));
//! assert_eq!(clock.now().duration_since(start), Duration::from_secs(5));
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Source of monotonic and wall-clock time
pub trait Clock: Send + Sync + 'static {
    /// Monotonic instant, for measuring elapsed time.
    fn now(&self) -> Instant;

    /// Wall-clock time in UTC.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Real system clock for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        (**self).utc_now()
    }
}

/// Manually advanced clock for deterministic tests
///
/// Clones share the same elapsed time, so a clone handed to the code under
/// test observes every `advance` made by the test.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    base_utc: DateTime<Utc>,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Mock clock starting at the current real time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Mock clock whose wall-clock time starts at `base_utc`.
    pub fn starting_at(base_utc: DateTime<Utc>) -> Self {
        Self { start: Instant::now(), base_utc, elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    pub fn advance_secs(&self, secs: u64) {
        self.advance(Duration::from_secs(secs));
    }

    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.elapsed()).unwrap_or(chrono::Duration::MAX);
        self.base_utc + elapsed
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn mock_clock_advances_both_time_sources() {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = MockClock::starting_at(base);
        let start = clock.now();

        clock.advance_secs(90);

        assert_eq!(clock.now().duration_since(start), Duration::from_secs(90));
        assert_eq!(clock.utc_now(), base + chrono::Duration::seconds(90));
    }

    #[test]
    fn clones_share_elapsed_time() {
        let clock = MockClock::new();
        let shared = clock.clone();
        clock.advance_secs(3);
        assert_eq!(shared.elapsed(), Duration::from_secs(3));
    }
}
