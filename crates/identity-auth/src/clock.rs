//! Wall-clock abstraction
//!
//! Expiry checks read time through [`Clock`] so tests can pin and advance
//! it instead of sleeping.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Manually driven clock for tests.
///
/// Clones share the same underlying instant.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move the clock forward (or backward, with a negative duration).
    pub fn advance(&self, by: Duration) {
        *self.instant() += by;
    }

    /// Jump the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.instant() = instant;
    }

    // poisoning is ignored; the pinned instant is still valid
    fn instant(&self) -> MutexGuard<'_, DateTime<Utc>> {
        self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.instant()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_mock_clock_advance_is_shared() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = MockClock::new(start);
        let other = clock.clone();

        clock.advance(Duration::minutes(10));
        assert_eq!(other.now(), start + Duration::minutes(10));

        other.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_poisoned_clock_stays_pinned() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = MockClock::new(start);
        let shared = clock.clone();

        let _ = std::thread::spawn(move || {
            let _guard = shared.now.lock().unwrap();
            panic!("test thread failed while holding the clock");
        })
        .join();
        assert!(clock.now.is_poisoned());

        assert_eq!(clock.now(), start);
        clock.advance(Duration::seconds(30));
        assert_eq!(clock.now(), start + Duration::seconds(30));
    }

    #[test]
    fn test_system_clock_moves() {
        let clock = Arc::new(SystemClock);
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
