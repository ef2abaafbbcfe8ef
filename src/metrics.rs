//! Lightweight atomic counters observing queue activity.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Atomics-based counters updated as a [`crate::queue::Queue`] is used.
///
/// Every field is an independent atomic, so reading a [`QueueMetricsSnapshot`]
/// is not a consistent point-in-time view across fields — acceptable for
/// observability counters, the same tradeoff the teacher's own `Metrics` type
/// makes.
#[derive(Debug, Default)]
pub struct QueueMetrics {
    pushes: AtomicU64,
    pops: AtomicU64,
    would_blocks: AtomicU64,
    timeouts: AtomicU64,
    high_water_mark: AtomicUsize,
}

impl QueueMetrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_push(&self, occupancy_after: usize) {
        self.pushes.fetch_add(1, Ordering::Relaxed);
        self.high_water_mark.fetch_max(occupancy_after, Ordering::Relaxed);
    }

    pub(crate) fn record_pop(&self) {
        self.pops.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_would_block(&self) {
        self.would_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a consistent-enough snapshot of all counters for reporting.
    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            pushes: self.pushes.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
            would_blocks: self.would_blocks.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            high_water_mark: self.high_water_mark.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`QueueMetrics`]' counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueMetricsSnapshot {
    pub pushes: u64,
    pub pops: u64,
    pub would_blocks: u64,
    pub timeouts: u64,
    pub high_water_mark: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_activity() {
        let metrics = QueueMetrics::new();
        metrics.record_push(1);
        metrics.record_push(2);
        metrics.record_pop();
        metrics.record_would_block();
        metrics.record_timeout();

        let snap = metrics.snapshot();
        assert_eq!(snap.pushes, 2);
        assert_eq!(snap.pops, 1);
        assert_eq!(snap.would_blocks, 1);
        assert_eq!(snap.timeouts, 1);
        assert_eq!(snap.high_water_mark, 2);
    }

    #[test]
    fn high_water_mark_keeps_the_max() {
        let metrics = QueueMetrics::new();
        metrics.record_push(3);
        metrics.record_push(1);
        assert_eq!(metrics.snapshot().high_water_mark, 3);
    }
}
