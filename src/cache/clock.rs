//! Clock Module
//!
//! Time source abstraction consulted by the store for "now".

use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeDelta, Utc};

// == Clock Trait ==
/// Source of the current time.
///
/// Expiration is a pure function of an entry's deadline and the value
/// returned here, so substituting a controllable clock makes expiry
/// deterministic.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> DateTime<Utc>;
}

// == System Clock ==
/// Wall clock backed by [`Utc::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// == Manual Clock ==
/// A clock that only moves when told to.
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and hand another to the store.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Moves the clock forward (or backward, for a negative delta).
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.lock();
        *now = now.checked_add_signed(delta).unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    /// Jumps the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.lock() = instant;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Utc>> {
        // A plain timestamp cannot be left half-written
        self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ManualClock {
    /// Starts at the current wall-clock time.
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.lock()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::new(epoch());
        assert_eq!(clock.now(), epoch());
        assert_eq!(clock.now(), epoch());
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new(epoch());
        clock.advance(TimeDelta::seconds(90));
        assert_eq!(clock.now(), epoch() + TimeDelta::seconds(90));
    }

    #[test]
    fn test_manual_clock_clones_share_time() {
        let clock = ManualClock::new(epoch());
        let handle = clock.clone();

        handle.advance(TimeDelta::minutes(5));
        assert_eq!(clock.now(), epoch() + TimeDelta::minutes(5));

        handle.set(epoch());
        assert_eq!(clock.now(), epoch());
    }

    #[test]
    fn test_manual_clock_advance_saturates() {
        let clock = ManualClock::new(DateTime::<Utc>::MAX_UTC);
        clock.advance(TimeDelta::days(1));
        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
