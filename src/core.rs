//! The synchronization and storage core shared by every [`crate::queue::Queue`] operation.
//!
//! `QueueCore<T>` ties together [`RingStorage`], the pair of counting
//! [`Semaphore`]s, and the two per-side mutexes into the push/pop protocol
//! described by `SPEC_FULL.md` §4.3:
//!
//! 1. Acquire a permit from the side's semaphore (`push_free` to push,
//!    `pop_ready` to pop) according to the caller's [`WaitMode`].
//! 2. Take the side's index lock, and *while still holding it*: read the
//!    current index, touch the slot at that index (write for push, read for
//!    pop), and advance the index. Step 1 guarantees no other thread can be
//!    touching that same slot from the other side; holding the lock across
//!    the whole of step 2 (not just the index bookkeeping) is what serializes
//!    same-side callers against each other, since two producers (or two
//!    consumers) that claimed adjacent indices could otherwise finish their
//!    slot access out of order.
//! 3. Release a permit on the *other* semaphore, waking anyone waiting on
//!    that side.
//!
//! This four-step shape mirrors the teacher's reserve-then-commit flow for
//! claiming a slot before writing to it, generalized here from a lock-free
//! sequence-number handshake to a blocking semaphore handshake.

use crate::invariants::debug_assert_semaphore_sum;
use crate::metrics::QueueMetrics;
use crate::semaphore::{Semaphore, WaitMode};
use crate::storage::RingStorage;
use crate::SemaphoreError;
use crate::QueueError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Produces the value to be written into a claimed slot.
///
/// Implemented directly by `T` (ordinary push-by-value) and by
/// [`FromFn`] (construct-in-place via a closure, called only once a slot is
/// actually reserved). Monomorphized per caller, so there is no dynamic
/// dispatch on the push path despite the variety of ways a caller can supply
/// a value.
pub(crate) trait PushAction<T> {
    fn produce(self) -> T;
}

impl<T> PushAction<T> for T {
    fn produce(self) -> T {
        self
    }
}

/// Wraps a closure so it can be used as a [`PushAction`], deferring
/// construction of the value until a slot has actually been reserved.
pub(crate) struct FromFn<F>(pub F);

impl<T, F> PushAction<T> for FromFn<F>
where
    F: FnOnce() -> T,
{
    fn produce(self) -> T {
        (self.0)()
    }
}

/// Consumes the value read out of a claimed slot, producing whatever a given
/// pop variant returns to its caller.
pub(crate) trait PopAction<T> {
    type Output;
    fn consume(self, value: T) -> Self::Output;
}

/// The idiomatic move-out pop: the popped value becomes the return value.
pub(crate) struct MoveOut;

impl<T> PopAction<T> for MoveOut {
    type Output = T;
    fn consume(self, value: T) -> T {
        value
    }
}

/// The C++-style swap-pop: the popped value is written into a caller-owned
/// slot instead of being returned, avoiding a move of a possibly-large `T`
/// through the return path. Rust's move semantics make this unnecessary for
/// the common case, but the shape is offered for API parity with the
/// out-parameter style `SPEC_FULL.md` §4.4 describes.
pub(crate) struct SwapInto<'a, T>(pub &'a mut T);

impl<'a, T> PopAction<T> for SwapInto<'a, T> {
    type Output = ();
    fn consume(self, value: T) {
        *self.0 = value;
    }
}

pub(crate) struct QueueCore<T> {
    storage: RingStorage<T>,
    capacity: usize,
    /// Counts initialized slots waiting to be popped. Bounded by `capacity`.
    pop_ready: Semaphore,
    /// Counts free slots available to push into. Bounded by `capacity`.
    push_free: Semaphore,
    write_index: Mutex<usize>,
    read_index: Mutex<usize>,
    fair: bool,
    closed: AtomicBool,
    metrics: QueueMetrics,
}

impl<T> QueueCore<T> {
    pub(crate) fn new(capacity: usize, fair: bool) -> Self {
        Self {
            storage: RingStorage::new(capacity),
            capacity,
            pop_ready: Semaphore::new(0, capacity),
            push_free: Semaphore::new(capacity, capacity),
            write_index: Mutex::new(0),
            read_index: Mutex::new(0),
            fair,
            closed: AtomicBool::new(false),
            metrics: QueueMetrics::new(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn metrics(&self) -> &QueueMetrics {
        &self.metrics
    }

    /// Approximate occupancy at the instant of the call; concurrent
    /// pushers/poppers may change it immediately afterward.
    pub(crate) fn len(&self) -> usize {
        self.pop_ready.value()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Closes the queue: no push started after this call (or still blocked
    /// when it runs) will complete. Pops continue to drain already-buffered
    /// items; once the buffer is empty, pops also fail with `Interrupted`.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.push_free.close();
        self.pop_ready.close();
    }

    pub(crate) fn push_action<A: PushAction<T>>(
        &self,
        action: A,
        mode: WaitMode,
    ) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Interrupted);
        }

        self.acquire(&self.push_free, mode)?;

        // The queue may have been closed while we were blocked above; a
        // permit earned under drain semantics does not entitle a *push* to
        // go through, since closing means no new data enters the queue.
        if self.is_closed() {
            self.push_free
                .post()
                .expect("returning an unused permit cannot overflow push_free");
            return Err(QueueError::Interrupted);
        }

        self.claim_index_with(&self.write_index, |index| {
            // SAFETY: holding a push_free permit guarantees this slot is not
            // currently initialized, and holding write_index for the whole of
            // this closure serializes this writer's slot access against
            // every other concurrent pusher's.
            unsafe {
                self.storage.write(index, action.produce());
            }
        });

        if let Err(err) = self.pop_ready.post() {
            debug_assert!(
                false,
                "pop_ready overflowed: push_free accounted for the free slot, so this is a bug"
            );
            return Err(err.into());
        }
        self.metrics.record_push(self.pop_ready.value());
        debug_assert_semaphore_sum!(self.pop_ready.value(), self.push_free.value(), self.capacity);
        Ok(())
    }

    pub(crate) fn pop_action<A: PopAction<T>>(
        &self,
        action: A,
        mode: WaitMode,
    ) -> Result<A::Output, QueueError> {
        if self.is_closed() && self.pop_ready.value() == 0 {
            return Err(QueueError::Interrupted);
        }

        self.acquire(&self.pop_ready, mode)?;

        let value = self.claim_index_with(&self.read_index, |index| {
            // SAFETY: holding a pop_ready permit guarantees this slot
            // currently holds a value written by some past push, and holding
            // read_index for the whole of this closure serializes this
            // reader's slot access against every other concurrent popper's.
            unsafe { self.storage.read(index) }
        });

        if let Err(err) = self.push_free.post() {
            debug_assert!(
                false,
                "push_free overflowed: pop_ready accounted for the held slot, so this is a bug"
            );
            return Err(err.into());
        }
        self.metrics.record_pop();
        debug_assert_semaphore_sum!(self.pop_ready.value(), self.push_free.value(), self.capacity);
        Ok(action.consume(value))
    }

    /// Drops every value still resident in the ring. Only safe to call when
    /// no other reference to this core can observe it concurrently, which
    /// `&mut self` guarantees.
    pub(crate) fn drain_for_drop(&mut self) {
        let mut index = *self.read_index.get_mut().unwrap();
        let occupancy = self.pop_ready.value();
        for _ in 0..occupancy {
            // SAFETY: `occupancy` slots starting at `index` were initialized
            // by past pushes and not yet read, and we have exclusive access.
            unsafe {
                self.storage.drop_in_place(index);
            }
            index = self.storage.advance(index);
        }
    }

    fn acquire(&self, semaphore: &Semaphore, mode: WaitMode) -> Result<(), QueueError> {
        match semaphore.acquire(mode) {
            Ok(()) => Ok(()),
            Err(SemaphoreError::WouldBlock) => {
                self.metrics.record_would_block();
                Err(QueueError::WouldBlock)
            }
            Err(SemaphoreError::TimedOut) => {
                self.metrics.record_timeout();
                Err(QueueError::TimedOut)
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Claims the current index on `side`, invokes `f` on it — while still
    /// holding `side`'s lock — and only then advances and stores the next
    /// index. Holding the lock across `f`, not just across the index
    /// bookkeeping, is what makes this a true critical section: it prevents
    /// two same-side callers (two producers, or two consumers) from touching
    /// their respective slots concurrently and finishing out of order, which
    /// would otherwise let a consumer observe a slot before its producer's
    /// write (or vice versa) even though each individually holds a valid
    /// semaphore permit for its own slot.
    fn claim_index_with<R>(&self, side: &Mutex<usize>, f: impl FnOnce(usize) -> R) -> R {
        let mut guard = self.lock_side(side);
        let index = *guard;
        let result = f(index);
        *guard = self.storage.advance(index);
        result
    }

    /// Acquires a side's index lock. With `fair` set, same-side callers
    /// queue on the mutex in roughly arrival order (the platform's default
    /// mutex policy); with it cleared, callers spin on `try_lock`, trading
    /// fairness among same-side callers for lower latency under light
    /// contention. Either way the queue's overall item order is untouched,
    /// since that is enforced by the semaphores, not this lock.
    fn lock_side<'a>(&self, side: &'a Mutex<usize>) -> std::sync::MutexGuard<'a, usize> {
        if self.fair {
            side.lock().unwrap()
        } else {
            loop {
                if let Ok(guard) = side.try_lock() {
                    return guard;
                }
                std::hint::spin_loop();
            }
        }
    }
}

/// Converts a `(mode-selecting) Duration/Instant` pair of convenience
/// constructors used by [`crate::queue::Queue`]'s timed push/pop methods.
impl WaitMode {
    pub(crate) fn timeout(duration: Duration) -> Self {
        WaitMode::Timeout(duration)
    }

    pub(crate) fn deadline(deadline: Instant) -> Self {
        WaitMode::Deadline(deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_preserves_order() {
        let core: QueueCore<u32> = QueueCore::new(4, true);
        core.push_action(1u32, WaitMode::Blocking).unwrap();
        core.push_action(2u32, WaitMode::Blocking).unwrap();
        assert_eq!(core.pop_action(MoveOut, WaitMode::Blocking).unwrap(), 1);
        assert_eq!(core.pop_action(MoveOut, WaitMode::Blocking).unwrap(), 2);
    }

    #[test]
    fn try_push_fails_when_full() {
        let core: QueueCore<u32> = QueueCore::new(1, true);
        core.push_action(1u32, WaitMode::Try).unwrap();
        assert_eq!(
            core.push_action(2u32, WaitMode::Try),
            Err(QueueError::WouldBlock)
        );
    }

    #[test]
    fn try_pop_fails_when_empty() {
        let core: QueueCore<u32> = QueueCore::new(1, true);
        assert_eq!(
            core.pop_action(MoveOut, WaitMode::Try),
            Err(QueueError::WouldBlock)
        );
    }

    #[test]
    fn push_with_fn_constructs_only_once_slot_is_reserved() {
        let core: QueueCore<String> = QueueCore::new(1, true);
        let mut constructed = false;
        core.push_action(
            FromFn(|| {
                constructed = true;
                "hello".to_string()
            }),
            WaitMode::Blocking,
        )
        .unwrap();
        assert!(constructed);
        assert_eq!(
            core.pop_action(MoveOut, WaitMode::Blocking).unwrap(),
            "hello"
        );
    }

    #[test]
    fn swap_pop_writes_into_caller_slot() {
        let core: QueueCore<u32> = QueueCore::new(1, true);
        core.push_action(7u32, WaitMode::Blocking).unwrap();
        let mut out = 0u32;
        core.pop_action(SwapInto(&mut out), WaitMode::Blocking)
            .unwrap();
        assert_eq!(out, 7);
    }

    #[test]
    fn close_blocks_new_pushes_but_drains_existing_pops() {
        let core: QueueCore<u32> = QueueCore::new(2, true);
        core.push_action(1u32, WaitMode::Blocking).unwrap();
        core.close();

        assert_eq!(
            core.push_action(2u32, WaitMode::Try),
            Err(QueueError::Interrupted)
        );
        assert_eq!(core.pop_action(MoveOut, WaitMode::Try).unwrap(), 1);
        assert_eq!(
            core.pop_action(MoveOut, WaitMode::Try),
            Err(QueueError::Interrupted)
        );
    }

    #[test]
    fn drain_for_drop_runs_destructors_on_remaining_items() {
        use std::rc::Rc;
        let mut core: QueueCore<Rc<()>> = QueueCore::new(2, true);
        let value = Rc::new(());
        let weak = Rc::downgrade(&value);
        core.push_action(value, WaitMode::Blocking).unwrap();
        core.drain_for_drop();
        assert!(weak.upgrade().is_none());
    }
}
