//! Time source for activation timestamps and elapsed-time scores.
//!
//! The scored policies divide work counters by elapsed seconds, so tests need
//! to move time forward without sleeping. Production code uses `SystemClock`;
//! tests drive a `ManualClock` and advance it explicitly.

use std::sync::Mutex;

use chrono::Utc;

/// Source of the current time as fractional epoch seconds.
pub trait Clock: Send + Sync {
    /// Returns the current time in seconds since the Unix epoch.
    fn now(&self) -> f64;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        Utc::now().timestamp_micros() as f64 / 1_000_000.0
    }
}

/// A clock that only moves when told to.
///
/// Useful for deterministic elapsed-time assertions: activate queues, advance
/// the clock by a known number of seconds, and scores become exact.
#[derive(Debug, Default)]
pub struct ManualClock {
    seconds: Mutex<f64>,
}

impl ManualClock {
    /// Creates a clock starting at the given epoch second.
    pub fn new(start: f64) -> Self {
        Self {
            seconds: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `secs`.
    pub fn advance(&self, secs: f64) {
        let mut now = self.seconds.lock().expect("clock lock poisoned");
        *now += secs;
    }

    /// Sets the clock to an absolute epoch second.
    pub fn set(&self, secs: f64) {
        let mut now = self.seconds.lock().expect("clock lock poisoned");
        *now = secs;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.seconds.lock().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(100.0);
        assert_eq!(clock.now(), 100.0);

        clock.advance(2.5);
        assert_eq!(clock.now(), 102.5);

        clock.set(50.0);
        assert_eq!(clock.now(), 50.0);
    }

    #[test]
    fn test_system_clock_is_reasonable() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        // 2020-01-01 in epoch seconds; sanity only
        assert!(a > 1_577_836_800.0);
        assert!(b >= a);
    }
}
