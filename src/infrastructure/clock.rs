//! Wall and monotonic time from the operating system.

use crate::application::ports::Clock;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Reads the OS clocks on every call.
///
/// Rate-limit and debounce windows use the monotonic reading; history
/// timestamps use the wall-clock reading.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_monotonic_reading_advances() {
        let clock = SystemClock::new();
        let earlier = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now() > earlier);
    }

    #[test]
    fn test_wall_clock_reading() {
        let before = Utc::now();
        let reading = SystemClock::new().utc_now();
        let after = Utc::now();
        assert!(before <= reading && reading <= after);
    }
}
