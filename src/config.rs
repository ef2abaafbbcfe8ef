//! Queue construction parameters.

/// Construction-time parameters for a [`crate::queue::Queue`].
///
/// `QueueConfig` is consumed once, by [`crate::queue::Queue::with_config`];
/// there is nothing in it that can be changed after construction, since the
/// ring's capacity is fixed for the queue's whole lifetime (no dynamic
/// allocation after construction, per `SPEC_FULL.md` §3).
#[derive(Debug, Clone, Copy)]
pub struct QueueConfig {
    capacity: usize,
    fair: bool,
}

impl QueueConfig {
    /// Starts a config for a queue of the given capacity (must be non-zero).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            fair: true,
        }
    }

    /// Sets whether same-side callers (concurrent pushers, or concurrent
    /// poppers) are served in strict arrival order.
    ///
    /// `SPEC_FULL.md` §4.2 lists "acceptable implementations" for same-side
    /// mutual exclusion without mandating an ordering among them; this toggle
    /// exposes that choice. Disabling fairness lets same-side callers race
    /// for the per-side lock (whichever thread the OS scheduler favors wins),
    /// which is cheaper under contention but gives up the FIFO guarantee
    /// *among pushers* or *among poppers* — the queue's own item order is
    /// unaffected either way, since that is enforced by the semaphores, not
    /// by this lock.
    #[must_use]
    pub fn fair(mut self, fair: bool) -> Self {
        self.fair = fair;
        self
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn is_fair(&self) -> bool {
        self.fair
    }
}

impl Default for QueueConfig {
    /// A queue of capacity 16 with fair same-side ordering enabled.
    fn default() -> Self {
        Self::new(16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fair_with_capacity_16() {
        let cfg = QueueConfig::default();
        assert_eq!(cfg.capacity(), 16);
        assert!(cfg.is_fair());
    }

    #[test]
    fn fair_toggle_is_chainable() {
        let cfg = QueueConfig::new(4).fair(false);
        assert_eq!(cfg.capacity(), 4);
        assert!(!cfg.is_fair());
    }
}
