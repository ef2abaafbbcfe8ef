//! A blocking, FIFO-ordered counting semaphore.
//!
//! [`Semaphore`] is the queue's sole synchronization primitive (per
//! `SPEC_FULL.md` §4.1): a non-negative integer bounded by a configured
//! maximum, decremented by a blocking/timed/try `wait`, incremented by
//! `post`, and guaranteed to wake blocked waiters in the order they arrived.
//!
//! `std::sync::Condvar` gives no ordering guarantee on which waiter wakes
//! first, so FIFO order is realized with a ticket scheme: each blocking or
//! timed waiter draws a strictly increasing ticket under the semaphore's
//! mutex, and only the waiter whose ticket matches `next_to_serve` is
//! eligible to take a unit of value. A waiter that times out or is woken by
//! `close()` before its turn cannot simply walk away — doing so would strand
//! every ticket behind it — so it marks its own ticket abandoned, and
//! whichever thread next holds the lock fast-forwards `next_to_serve` past
//! any abandoned tickets before checking whose turn it is.

use crate::error::SemaphoreError;
use crate::interrupt::in_interrupt_context;
use crate::invariants::debug_assert_ticket_monotonic;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct Inner {
    value: usize,
    max: usize,
    closed: bool,
    next_ticket: u64,
    next_to_serve: u64,
    abandoned: HashSet<u64>,
}

impl Inner {
    /// Fast-forwards `next_to_serve` past any tickets whose waiters already
    /// gave up (timed out or were interrupted before their turn).
    fn skip_abandoned(&mut self) {
        let before = self.next_to_serve;
        while self.abandoned.remove(&self.next_to_serve) {
            self.next_to_serve += 1;
        }
        debug_assert_ticket_monotonic!(before, self.next_to_serve);
    }

    /// Whether no one is currently queued ahead of a fresh `try_wait` caller.
    fn queue_is_empty(&self) -> bool {
        self.next_to_serve == self.next_ticket
    }
}

/// Selects which of the four acquisition strategies [`Semaphore::acquire`]
/// uses, so [`crate::core::QueueCore`] can drive push/pop through one code
/// path parameterized by the caller's chosen wait discipline.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WaitMode {
    Blocking,
    Try,
    Timeout(Duration),
    Deadline(Instant),
}

/// A counting semaphore with FIFO-ordered blocking, timed, and non-blocking
/// acquisition, plus a one-way `close` that aborts all current and future
/// waiters.
pub struct Semaphore {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with the given initial value and maximum.
    ///
    /// # Panics
    ///
    /// Panics if `initial_value > max`.
    pub fn new(initial_value: usize, max: usize) -> Self {
        assert!(
            initial_value <= max,
            "initial_value {initial_value} exceeds max {max}"
        );
        Self {
            inner: Mutex::new(Inner {
                value: initial_value,
                max,
                closed: false,
                next_ticket: 0,
                next_to_serve: 0,
                abandoned: HashSet::new(),
            }),
            condvar: Condvar::new(),
        }
    }

    /// Current value (number of units available to acquire).
    pub fn value(&self) -> usize {
        self.inner.lock().unwrap().value
    }

    /// The configured maximum value.
    pub fn max(&self) -> usize {
        self.inner.lock().unwrap().max
    }

    /// Whether the semaphore has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Blocks until a unit is available, then acquires it.
    ///
    /// Returns `Err(OperationNotPermitted)` immediately, without blocking, if
    /// called from within an [`crate::interrupt::InterruptContext`] guard.
    /// Returns `Err(Interrupted)` if the semaphore is or becomes closed
    /// before this waiter's turn.
    pub fn wait(&self) -> Result<(), SemaphoreError> {
        if in_interrupt_context() {
            return Err(SemaphoreError::OperationNotPermitted);
        }
        self.blocking_wait(None)
    }

    /// Like [`Semaphore::wait`], but gives up after `duration` if no unit
    /// became available in this waiter's turn.
    pub fn try_wait_for(&self, duration: Duration) -> Result<(), SemaphoreError> {
        if in_interrupt_context() {
            return Err(SemaphoreError::OperationNotPermitted);
        }
        self.blocking_wait(Some(Instant::now() + duration))
    }

    /// Like [`Semaphore::wait`], but gives up at `deadline` if no unit became
    /// available in this waiter's turn.
    pub fn try_wait_until(&self, deadline: Instant) -> Result<(), SemaphoreError> {
        if in_interrupt_context() {
            return Err(SemaphoreError::OperationNotPermitted);
        }
        self.blocking_wait(Some(deadline))
    }

    /// Non-blocking acquire. Succeeds only if a unit is available *and* no
    /// other caller is already queued ahead (preserving FIFO fairness
    /// against blocked waiters). Never suspends the caller; always callable
    /// from an interrupt context.
    ///
    /// A closed semaphore still yields units it already has on hand (so
    /// draining already-available work survives a `close`); only once the
    /// semaphore is both closed and at zero does this return `Interrupted`
    /// instead of `WouldBlock`.
    pub fn try_wait(&self) -> Result<(), SemaphoreError> {
        let mut guard = self.inner.lock().unwrap();
        guard.skip_abandoned();

        if !guard.queue_is_empty() {
            return Err(SemaphoreError::WouldBlock);
        }
        if guard.value == 0 {
            return Err(if guard.closed {
                SemaphoreError::Interrupted
            } else {
                SemaphoreError::WouldBlock
            });
        }

        guard.value -= 1;
        guard.next_ticket += 1;
        guard.next_to_serve += 1;
        Ok(())
    }

    /// Releases a unit, waking the next ticket-holder (if any).
    ///
    /// Always callable from an interrupt context; never suspends the caller.
    ///
    /// A caller with its own invariant guaranteeing this can never happen
    /// (as [`crate::core::QueueCore`] has) should additionally
    /// `debug_assert!` on success at its own call site — see `SPEC_FULL.md`
    /// §9. `Semaphore` itself stays a plain fallible primitive and never
    /// panics here, since a directly-used semaphore has no such guarantee
    /// and `Overflow` is simply the caller's bug to handle.
    pub fn post(&self) -> Result<(), SemaphoreError> {
        let mut guard = self.inner.lock().unwrap();
        if guard.value >= guard.max {
            return Err(SemaphoreError::Overflow);
        }
        guard.value += 1;
        drop(guard);
        self.condvar.notify_all();
        Ok(())
    }

    /// Dispatches to the acquisition strategy named by `mode`.
    pub(crate) fn acquire(&self, mode: WaitMode) -> Result<(), SemaphoreError> {
        match mode {
            WaitMode::Blocking => self.wait(),
            WaitMode::Try => self.try_wait(),
            WaitMode::Timeout(duration) => self.try_wait_for(duration),
            WaitMode::Deadline(deadline) => self.try_wait_until(deadline),
        }
    }

    /// Closes the semaphore: wakes every current waiter and marks all future
    /// calls as closed. A waiter whose turn has already come, and for whom a
    /// unit is available, still succeeds — only a waiter that would
    /// otherwise have to keep waiting gets `Interrupted`. Idempotent; cannot
    /// be undone.
    pub fn close(&self) {
        let mut guard = self.inner.lock().unwrap();
        guard.closed = true;
        drop(guard);
        self.condvar.notify_all();
    }

    fn blocking_wait(&self, deadline: Option<Instant>) -> Result<(), SemaphoreError> {
        let mut guard = self.inner.lock().unwrap();
        guard.skip_abandoned();

        let my_ticket = guard.next_ticket;
        guard.next_ticket += 1;

        loop {
            guard.skip_abandoned();

            if guard.next_to_serve == my_ticket && guard.value > 0 {
                guard.value -= 1;
                guard.next_to_serve += 1;
                drop(guard);
                self.condvar.notify_all();
                return Ok(());
            }

            if guard.closed {
                self.abandon(&mut guard, my_ticket);
                return Err(SemaphoreError::Interrupted);
            }

            guard = match deadline {
                None => self.condvar.wait(guard).unwrap(),
                Some(dl) => {
                    let now = Instant::now();
                    if now >= dl {
                        self.abandon(&mut guard, my_ticket);
                        return Err(SemaphoreError::TimedOut);
                    }
                    let (guard, _timed_out) =
                        self.condvar.wait_timeout(guard, dl - now).unwrap();
                    guard
                }
            };
        }
    }

    /// Marks `ticket` abandoned and wakes other waiters so they can notice
    /// `next_to_serve` may now be free to advance past it.
    fn abandon(&self, guard: &mut Inner, ticket: u64) {
        if guard.next_to_serve == ticket {
            guard.next_to_serve += 1;
            guard.skip_abandoned();
        } else {
            guard.abandoned.insert(ticket);
        }
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn wait_and_post_roundtrip() {
        let sem = Semaphore::new(1, 1);
        sem.wait().unwrap();
        assert_eq!(sem.value(), 0);
        sem.post().unwrap();
        assert_eq!(sem.value(), 1);
    }

    #[test]
    fn try_wait_fails_when_empty() {
        let sem = Semaphore::new(0, 1);
        assert_eq!(sem.try_wait(), Err(SemaphoreError::WouldBlock));
    }

    #[test]
    fn post_fails_at_max() {
        let sem = Semaphore::new(1, 1);
        assert_eq!(sem.post(), Err(SemaphoreError::Overflow));
    }

    #[test]
    fn try_wait_for_times_out_on_empty_queue() {
        let sem = Semaphore::new(0, 1);
        let started = Instant::now();
        assert_eq!(
            sem.try_wait_for(Duration::from_millis(20)),
            Err(SemaphoreError::TimedOut)
        );
        assert!(started.elapsed() >= Duration::from_millis(20));
        // Timing out must not perturb the semaphore's value.
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn close_wakes_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0, 1));
        let waiter = {
            let sem = Arc::clone(&sem);
            thread::spawn(move || sem.wait())
        };
        thread::sleep(Duration::from_millis(20));
        sem.close();
        assert_eq!(waiter.join().unwrap(), Err(SemaphoreError::Interrupted));
    }

    #[test]
    fn wake_order_is_fifo() {
        let sem = Arc::new(Semaphore::new(0, 1));
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for id in 0..4 {
            let sem = Arc::clone(&sem);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                // Stagger arrival so ticket order is deterministic.
                thread::sleep(Duration::from_millis(id * 15));
                sem.wait().unwrap();
                order.lock().unwrap().push(id);
                sem.post().unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn timed_out_waiter_does_not_strand_later_waiters() {
        let sem = Arc::new(Semaphore::new(0, 1));

        let sem1 = Arc::clone(&sem);
        let first = thread::spawn(move || sem1.try_wait_for(Duration::from_millis(30)));

        thread::sleep(Duration::from_millis(10));

        let sem2 = Arc::clone(&sem);
        let second = thread::spawn(move || sem2.try_wait_for(Duration::from_millis(500)));

        // Let the first waiter time out with nothing posted.
        assert_eq!(first.join().unwrap(), Err(SemaphoreError::TimedOut));

        // Now post: the second (still-blocked) waiter must be able to proceed.
        thread::sleep(Duration::from_millis(10));
        sem.post().unwrap();
        assert_eq!(second.join().unwrap(), Ok(()));
    }

    #[test]
    fn try_wait_does_not_barge_ahead_of_blocked_waiter() {
        let sem = Arc::new(Semaphore::new(0, 1));
        let sem1 = Arc::clone(&sem);
        let blocked = thread::spawn(move || sem1.wait());

        thread::sleep(Duration::from_millis(20));
        // A unit becomes available, but the blocked waiter has first claim.
        sem.post().unwrap();
        // Give the blocked waiter a moment to actually consume it.
        thread::sleep(Duration::from_millis(20));
        assert_eq!(blocked.join().unwrap(), Ok(()));
    }
}
