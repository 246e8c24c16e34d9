//! Mock clock for testing.

use crate::application::ports::Clock;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Clock whose time only moves when a test says so.
///
/// Both the monotonic instant and the wall-clock time advance together.
/// Clones share the same time.
///
/// ```
/// use error_notifier::infrastructure::mocks::MockClock;
/// use error_notifier::application::ports::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), start + Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    current: Arc<Mutex<(Instant, DateTime<Utc>)>>,
}

impl MockClock {
    /// Create a mock clock at `start`, with wall-clock time 2020-01-01T00:00:00Z.
    pub fn new(start: Instant) -> Self {
        let utc = Utc
            .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::with_utc(start, utc)
    }

    /// Create a mock clock with an explicit wall-clock time.
    pub fn with_utc(start: Instant, utc: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(Mutex::new((start, utc))),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.0 += duration;
        if let Ok(delta) = chrono::Duration::from_std(duration) {
            current.1 += delta;
        }
    }

    /// Set the monotonic time to a specific instant.
    pub fn set(&self, instant: Instant) {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).0 = instant;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).0
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner).1
    }
}
