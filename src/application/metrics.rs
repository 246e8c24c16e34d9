//! Observability metrics for notice delivery.
//!
//! Counts what happened to every notice so an operator can tell delivery
//! problems from filtering or offline buffering.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Delivery outcome counters.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Notices accepted by the collector
    notices_sent: AtomicU64,
    /// Notices discarded by a filter
    notices_filtered: AtomicU64,
    /// Notices that failed in size reduction or delivery
    notices_failed: AtomicU64,
    /// Notices put on the offline queue
    notices_queued: AtomicU64,
    /// Queued notices evicted by overflow
    notices_evicted: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_sent(&self) {
        self.inner.notices_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_filtered(&self) {
        self.inner.notices_filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.inner.notices_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_queued(&self) {
        self.inner.notices_queued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evicted(&self, count: u64) {
        self.inner
            .notices_evicted
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Get the number of notices accepted by the collector.
    pub fn notices_sent(&self) -> u64 {
        self.inner.notices_sent.load(Ordering::Relaxed)
    }

    /// Get the number of notices discarded by filters.
    pub fn notices_filtered(&self) -> u64 {
        self.inner.notices_filtered.load(Ordering::Relaxed)
    }

    /// Get the number of notices that failed.
    pub fn notices_failed(&self) -> u64 {
        self.inner.notices_failed.load(Ordering::Relaxed)
    }

    /// Get the number of notices queued while offline.
    pub fn notices_queued(&self) -> u64 {
        self.inner.notices_queued.load(Ordering::Relaxed)
    }

    /// Get the number of queued notices evicted by overflow.
    pub fn notices_evicted(&self) -> u64 {
        self.inner.notices_evicted.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            notices_sent: self.notices_sent(),
            notices_filtered: self.notices_filtered(),
            notices_failed: self.notices_failed(),
            notices_queued: self.notices_queued(),
            notices_evicted: self.notices_evicted(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.notices_sent.store(0, Ordering::Relaxed);
        self.inner.notices_filtered.store(0, Ordering::Relaxed);
        self.inner.notices_failed.store(0, Ordering::Relaxed);
        self.inner.notices_queued.store(0, Ordering::Relaxed);
        self.inner.notices_evicted.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Notices accepted by the collector
    pub notices_sent: u64,
    /// Notices discarded by a filter
    pub notices_filtered: u64,
    /// Notices that failed in size reduction or delivery
    pub notices_failed: u64,
    /// Notices put on the offline queue
    pub notices_queued: u64,
    /// Queued notices evicted by overflow
    pub notices_evicted: u64,
}

impl MetricsSnapshot {
    /// Fraction of delivery attempts that failed (0.0 to 1.0).
    ///
    /// Returns 0.0 if nothing was attempted.
    pub fn failure_rate(&self) -> f64 {
        let attempts = self.notices_sent.saturating_add(self.notices_failed);
        if attempts == 0 {
            0.0
        } else {
            self.notices_failed as f64 / attempts as f64
        }
    }
}
