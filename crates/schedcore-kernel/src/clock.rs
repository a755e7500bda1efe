//! Clock abstraction (injectable for testing).
//!
//! Injecting this rather than calling `SystemTime::now()` directly from the
//! scheduler and the schedule policies makes timing-sensitive logic
//! deterministic in tests — see the concrete scenarios in the scheduling
//! core's test suite, which all pin `now` to an exact second.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Supplies the current time as whole seconds since the Unix epoch.
///
/// Local-time adjustment is *not* this trait's job: the scheduler owns the
/// local/UTC offset (it can change independently of wall-clock time, e.g. on
/// a timezone change) and applies it on top of whatever this returns.
pub trait Clock: Send + Sync {
    /// Returns the current time as whole seconds since the Unix epoch.
    fn now(&self) -> i64;
}

/// The default [`Clock`], backed by [`SystemTime::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

/// A settable clock for deterministic tests.
///
/// Every concrete scenario in the scheduling core's design fixes `now` to an
/// exact second, so tests construct this with [`TestClock::at`] and advance
/// it explicitly rather than sleeping.
#[derive(Debug)]
pub struct TestClock {
    now: AtomicI64,
}

impl TestClock {
    /// Create a clock pinned at `epoch_seconds`.
    pub fn at(epoch_seconds: i64) -> Self {
        Self {
            now: AtomicI64::new(epoch_seconds),
        }
    }

    /// Move the clock forward (or backward, for time-jump tests) by `delta`
    /// seconds.
    pub fn advance(&self, delta: i64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }

    /// Pin the clock to an absolute value.
    pub fn set(&self, epoch_seconds: i64) {
        self.now.store(epoch_seconds, Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_returns_plausible_epoch() {
        let clock = SystemClock;
        // after 2020-01-01
        assert!(clock.now() > 1_577_836_800);
    }

    #[test]
    fn test_clock_advances_and_sets() {
        let clock = TestClock::at(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(50);
        assert_eq!(clock.now(), 1_050);
        clock.advance(-10);
        assert_eq!(clock.now(), 1_040);
        clock.set(2_000);
        assert_eq!(clock.now(), 2_000);
    }
}
