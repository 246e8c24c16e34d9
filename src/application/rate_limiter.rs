//! Collector-driven backoff.
//!
//! When the collector answers 429 with a delay, delivery pauses until the
//! reset time has passed. The reset time is stored as nanoseconds since an
//! epoch in an atomic and only ever moves forward, so concurrent deliveries
//! can race on it without a lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic rate-limit reset time shared by all delivery attempts.
#[derive(Debug)]
pub struct RateLimiter {
    /// Reference epoch for timestamp calculations
    epoch: Instant,
    reset_at_nanos: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter that is not blocking. Instants before `epoch` count as `epoch`.
    pub fn new(epoch: Instant) -> Self {
        Self {
            epoch,
            reset_at_nanos: AtomicU64::new(0),
        }
    }

    fn nanos_since_epoch(&self, instant: Instant) -> u64 {
        instant
            .saturating_duration_since(self.epoch)
            .as_nanos()
            .try_into()
            .unwrap_or(u64::MAX)
    }

    /// True if delivery must be refused at `now`.
    pub fn is_blocked(&self, now: Instant) -> bool {
        self.nanos_since_epoch(now) < self.reset_at_nanos.load(Ordering::Acquire)
    }

    /// Move the reset time to `until` unless it is already later.
    pub fn advance_reset_time(&self, until: Instant) {
        let nanos = self.nanos_since_epoch(until);
        self.reset_at_nanos.fetch_max(nanos, Ordering::AcqRel);
    }

    /// Move the reset time to `delay` after `now` unless it is already later.
    ///
    /// Delays past the representable range saturate, blocking indefinitely.
    pub fn advance_by(&self, now: Instant, delay: Duration) {
        let delay_nanos = u64::try_from(delay.as_nanos()).unwrap_or(u64::MAX);
        let nanos = self.nanos_since_epoch(now).saturating_add(delay_nanos);
        self.reset_at_nanos.fetch_max(nanos, Ordering::AcqRel);
    }

    /// The current reset time, `None` if it lies beyond what `Instant` can hold.
    pub fn reset_at(&self) -> Option<Instant> {
        self.epoch
            .checked_add(Duration::from_nanos(self.reset_at_nanos.load(Ordering::Acquire)))
    }
}
