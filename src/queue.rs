//! The public, typed queue facade.

use crate::config::QueueConfig;
use crate::core::{FromFn, MoveOut, PushAction as _, QueueCore, SwapInto};
use crate::error::QueueError;
use crate::metrics::QueueMetricsSnapshot;
use crate::semaphore::WaitMode;
use std::fmt;
use std::time::{Duration, Instant};

/// A bounded, blocking, FIFO queue of `T`.
///
/// Built from exactly two counting semaphores (`SPEC_FULL.md` §3–§4): one
/// counts slots ready to pop, the other counts slots free to push into.
/// Every operation comes in four flavors selected by the method name's
/// suffix (none = block until possible, `try_` = fail immediately,
/// `_timeout` = give up after a `Duration`, `_deadline` = give up at an
/// `Instant`), matching `SPEC_FULL.md` §4.4's wait-mode parameterization.
///
/// `Queue<T>` allocates its backing storage exactly once, at construction;
/// nothing it does afterward allocates or frees memory, which is what makes
/// it usable from a context with no heap (beyond the one upfront allocation)
/// and bounded worst-case latency per call.
pub struct Queue<T> {
    core: QueueCore<T>,
}

impl<T> Queue<T> {
    /// Creates a queue of the given capacity with default (fair) same-side
    /// lock ordering.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::with_config(QueueConfig::new(capacity))
    }

    /// Creates a queue from an explicit [`QueueConfig`].
    ///
    /// # Panics
    ///
    /// Panics if the config's capacity is zero.
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            core: QueueCore::new(config.capacity(), config.is_fair()),
        }
    }

    /// The fixed capacity chosen at construction.
    pub fn capacity(&self) -> usize {
        self.core.capacity()
    }

    /// The number of elements currently buffered. Racy under concurrent
    /// access — useful for monitoring, not for synchronization.
    pub fn len(&self) -> usize {
        self.core.len()
    }

    /// Whether the queue held no elements at the instant of the call.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether [`Queue::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    /// Closes the queue: every push started after this call (or already
    /// blocked when it runs) fails with [`QueueError::Interrupted`]. Pops
    /// keep draining whatever was already buffered; only once the queue is
    /// empty do pops also start failing with `Interrupted`.
    ///
    /// Idempotent; the queue cannot be reopened.
    pub fn close(&self) {
        self.core.close();
    }

    /// A snapshot of this queue's activity counters.
    pub fn metrics(&self) -> QueueMetricsSnapshot {
        self.core.metrics().snapshot()
    }

    /// Pushes `value`, blocking until a slot is free or the queue closes.
    pub fn push(&self, value: T) -> Result<(), QueueError> {
        self.core.push_action(value, WaitMode::Blocking)
    }

    /// Pushes `value` only if a slot is immediately free.
    pub fn try_push(&self, value: T) -> Result<(), QueueError> {
        self.core.push_action(value, WaitMode::Try)
    }

    /// Pushes `value`, giving up after `timeout` if no slot freed up.
    pub fn push_timeout(&self, value: T, timeout: Duration) -> Result<(), QueueError> {
        self.core.push_action(value, WaitMode::timeout(timeout))
    }

    /// Pushes `value`, giving up at `deadline` if no slot freed up.
    pub fn push_deadline(&self, value: T, deadline: Instant) -> Result<(), QueueError> {
        self.core.push_action(value, WaitMode::deadline(deadline))
    }

    /// Pushes a value produced by `f`, blocking until a slot is free.
    ///
    /// `f` runs only after a slot has actually been reserved, so a value
    /// that is expensive to build is never constructed only to be thrown
    /// away because the queue turned out to be full.
    pub fn push_with<F: FnOnce() -> T>(&self, f: F) -> Result<(), QueueError> {
        self.core.push_action(FromFn(f), WaitMode::Blocking)
    }

    /// Non-blocking variant of [`Queue::push_with`].
    pub fn try_push_with<F: FnOnce() -> T>(&self, f: F) -> Result<(), QueueError> {
        self.core.push_action(FromFn(f), WaitMode::Try)
    }

    /// Timed variant of [`Queue::push_with`].
    pub fn push_with_timeout<F: FnOnce() -> T>(
        &self,
        f: F,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        self.core.push_action(FromFn(f), WaitMode::timeout(timeout))
    }

    /// Deadline variant of [`Queue::push_with`].
    pub fn push_with_deadline<F: FnOnce() -> T>(
        &self,
        f: F,
        deadline: Instant,
    ) -> Result<(), QueueError> {
        self.core
            .push_action(FromFn(f), WaitMode::deadline(deadline))
    }

    /// Pops the oldest element, blocking until one is available or the
    /// queue closes and drains empty.
    pub fn pop(&self) -> Result<T, QueueError> {
        self.core.pop_action(MoveOut, WaitMode::Blocking)
    }

    /// Pops the oldest element only if one is immediately available.
    pub fn try_pop(&self) -> Result<T, QueueError> {
        self.core.pop_action(MoveOut, WaitMode::Try)
    }

    /// Pops the oldest element, giving up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, QueueError> {
        self.core.pop_action(MoveOut, WaitMode::timeout(timeout))
    }

    /// Pops the oldest element, giving up at `deadline`.
    pub fn pop_deadline(&self, deadline: Instant) -> Result<T, QueueError> {
        self.core.pop_action(MoveOut, WaitMode::deadline(deadline))
    }

    /// Pops the oldest element into `*out` instead of returning it by value
    /// (the out-parameter "swap-pop" shape `SPEC_FULL.md` §4.4 inherits from
    /// its originating design; [`Queue::pop`] is the idiomatic choice for
    /// new code).
    pub fn pop_into(&self, out: &mut T) -> Result<(), QueueError> {
        self.core.pop_action(SwapInto(out), WaitMode::Blocking)
    }

    /// Non-blocking variant of [`Queue::pop_into`].
    pub fn try_pop_into(&self, out: &mut T) -> Result<(), QueueError> {
        self.core.pop_action(SwapInto(out), WaitMode::Try)
    }

    /// Timed variant of [`Queue::pop_into`].
    pub fn pop_into_timeout(&self, out: &mut T, timeout: Duration) -> Result<(), QueueError> {
        self.core
            .pop_action(SwapInto(out), WaitMode::timeout(timeout))
    }

    /// Deadline variant of [`Queue::pop_into`].
    pub fn pop_into_deadline(&self, out: &mut T, deadline: Instant) -> Result<(), QueueError> {
        self.core
            .pop_action(SwapInto(out), WaitMode::deadline(deadline))
    }
}

impl<T: Clone> Queue<T> {
    /// Pushes a clone of `value`, blocking until a slot is free. Useful when
    /// the caller needs to keep using `value` after the push.
    pub fn push_clone(&self, value: &T) -> Result<(), QueueError> {
        self.core.push_action(value.clone(), WaitMode::Blocking)
    }

    /// Non-blocking variant of [`Queue::push_clone`].
    pub fn try_push_clone(&self, value: &T) -> Result<(), QueueError> {
        self.core.push_action(value.clone(), WaitMode::Try)
    }

    /// Timed variant of [`Queue::push_clone`].
    pub fn push_clone_timeout(&self, value: &T, timeout: Duration) -> Result<(), QueueError> {
        self.core
            .push_action(value.clone(), WaitMode::timeout(timeout))
    }

    /// Deadline variant of [`Queue::push_clone`].
    pub fn push_clone_deadline(&self, value: &T, deadline: Instant) -> Result<(), QueueError> {
        self.core
            .push_action(value.clone(), WaitMode::deadline(deadline))
    }
}

impl<T> Drop for Queue<T> {
    fn drop(&mut self) {
        self.core.drain_for_drop();
    }
}

impl<T> fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order_is_preserved() {
        let q = Queue::new(4);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert_eq!(q.pop().unwrap(), 1);
        assert_eq!(q.pop().unwrap(), 2);
        assert_eq!(q.pop().unwrap(), 3);
    }

    #[test]
    fn try_push_reports_full() {
        let q = Queue::new(1);
        q.try_push(1).unwrap();
        assert_eq!(q.try_push(2), Err(QueueError::WouldBlock));
    }

    #[test]
    fn try_pop_reports_empty() {
        let q: Queue<u32> = Queue::new(1);
        assert_eq!(q.try_pop(), Err(QueueError::WouldBlock));
    }

    #[test]
    fn push_timeout_expires_on_a_full_queue() {
        let q = Queue::new(1);
        q.push(1).unwrap();
        let started = Instant::now();
        assert_eq!(
            q.push_timeout(2, Duration::from_millis(20)),
            Err(QueueError::TimedOut)
        );
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn blocking_pop_wakes_once_producer_pushes() {
        let q = Arc::new(Queue::new(1));
        let reader = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop())
        };
        thread::sleep(Duration::from_millis(20));
        q.push(99).unwrap();
        assert_eq!(reader.join().unwrap(), Ok(99));
    }

    #[test]
    fn close_drains_then_reports_interrupted() {
        let q = Queue::new(2);
        q.push(1).unwrap();
        q.close();

        assert_eq!(q.try_push(2), Err(QueueError::Interrupted));
        assert_eq!(q.try_pop(), Ok(1));
        assert_eq!(q.try_pop(), Err(QueueError::Interrupted));
    }

    #[test]
    fn drop_drains_remaining_elements() {
        use std::rc::Rc;
        let q = Queue::new(2);
        let a = Rc::new(());
        let b = Rc::new(());
        let weak_a = Rc::downgrade(&a);
        let weak_b = Rc::downgrade(&b);
        q.push(a).unwrap();
        q.push(b).unwrap();
        drop(q);
        assert!(weak_a.upgrade().is_none());
        assert!(weak_b.upgrade().is_none());
    }

    #[test]
    fn push_clone_leaves_the_original_usable() {
        let q = Queue::new(2);
        let value = String::from("hello");
        q.push_clone(&value).unwrap();
        assert_eq!(value, "hello");
        assert_eq!(q.pop().unwrap(), "hello");
    }

    #[test]
    fn pop_into_swaps_the_caller_slot() {
        let q = Queue::new(1);
        q.push(42).unwrap();
        let mut out = 0;
        q.pop_into(&mut out).unwrap();
        assert_eq!(out, 42);
    }

    #[test]
    fn metrics_count_pushes_and_pops() {
        let q = Queue::new(2);
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.pop().unwrap();
        let snap = q.metrics();
        assert_eq!(snap.pushes, 2);
        assert_eq!(snap.pops, 1);
        assert_eq!(snap.high_water_mark, 2);
    }
}
