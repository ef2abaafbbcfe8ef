//! Loom-based exploration of the push/pop semaphore protocol.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! `Semaphore` and `QueueCore` are built on `std::sync::{Mutex, Condvar}`, not
//! `loom`'s instrumented equivalents, so they cannot be exercised directly
//! under loom's scheduler. This models the same handshake — one side posts a
//! unit, the other waits for it, with a single index lock per side, held
//! across the index's slot access as well as its own bookkeeping (not just
//! the bookkeeping alone — see `src/core.rs`'s `claim_index_with`) — at a
//! reduced scale (capacity 2, two to three threads) small enough for loom's
//! exhaustive interleaving search to finish in reasonable time, checking that
//! the protocol never loses, duplicates, or reorders an item, and never lets
//! two same-side callers touch their slots out of order.

#![cfg(feature = "loom")]

use loom::cell::UnsafeCell;
use loom::sync::{Condvar, Mutex};
use loom::thread;
use std::sync::Arc;

const CAPACITY: usize = 2;

struct LoomQueue {
    slots: [UnsafeCell<u64>; CAPACITY],
    ready: Mutex<usize>,
    ready_cv: Condvar,
    free: Mutex<usize>,
    free_cv: Condvar,
    write_index: Mutex<usize>,
    read_index: Mutex<usize>,
}

impl LoomQueue {
    fn new() -> Self {
        Self {
            slots: [UnsafeCell::new(0), UnsafeCell::new(0)],
            ready: Mutex::new(0),
            ready_cv: Condvar::new(),
            free: Mutex::new(CAPACITY),
            free_cv: Condvar::new(),
            write_index: Mutex::new(0),
            read_index: Mutex::new(0),
        }
    }

    fn push(&self, value: u64) {
        {
            let mut free = self.free.lock().unwrap();
            while *free == 0 {
                free = self.free_cv.wait(free).unwrap();
            }
            *free -= 1;
        }

        // `write_index` is held across the slot write itself, not just the
        // index bookkeeping: two concurrent pushers must not be allowed to
        // touch their respective slots concurrently, or the one that claimed
        // the later index could finish (and post `ready`) before the one
        // that claimed the earlier index has actually written it, letting a
        // popper observe an unwritten slot.
        {
            let mut write_index = self.write_index.lock().unwrap();
            let index = *write_index;
            // SAFETY: the free-permit this thread holds means no other
            // pusher can also be targeting `index` (write_index is locked
            // for the duration), and no popper can read it until the
            // ready-post below makes it visible.
            self.slots[index].with_mut(|slot| unsafe { *slot = value });
            *write_index = (index + 1) % CAPACITY;
        }

        {
            let mut ready = self.ready.lock().unwrap();
            *ready += 1;
        }
        self.ready_cv.notify_one();
    }

    fn pop(&self) -> u64 {
        {
            let mut ready = self.ready.lock().unwrap();
            while *ready == 0 {
                ready = self.ready_cv.wait(ready).unwrap();
            }
            *ready -= 1;
        }

        // `read_index` is held across the slot read itself, symmetric with
        // `push` above: two concurrent poppers must not be allowed to touch
        // their respective slots concurrently, or the one that claimed the
        // later index could finish (and post `free`) before the one that
        // claimed the earlier index has actually read it, letting a pusher
        // overwrite a slot that is still being read.
        let value = {
            let mut read_index = self.read_index.lock().unwrap();
            let index = *read_index;
            // SAFETY: the ready-permit this thread holds means the slot was
            // published by a push, and no other popper can also be reading
            // it (read_index is locked for the duration).
            let value = self.slots[index].with(|slot| unsafe { *slot });
            *read_index = (index + 1) % CAPACITY;
            value
        };

        {
            let mut free = self.free.lock().unwrap();
            *free += 1;
        }
        self.free_cv.notify_one();
        value
    }
}

unsafe impl Send for LoomQueue {}
unsafe impl Sync for LoomQueue {}

#[test]
fn single_producer_single_consumer_never_loses_or_duplicates() {
    loom::model(|| {
        let queue = Arc::new(LoomQueue::new());

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.push(1);
                queue.push(2);
            })
        };

        let first = queue.pop();
        let second = queue.pop();

        producer.join().unwrap();

        // FIFO: since both items come from the same single producer thread,
        // pushed strictly in order, they must also be observed in that order.
        assert_eq!((first, second), (1, 2));
    });
}

#[test]
fn concurrent_producer_and_consumer_conserve_every_item() {
    loom::model(|| {
        let queue = Arc::new(LoomQueue::new());
        let queue2 = Arc::clone(&queue);

        let producer = thread::spawn(move || {
            queue2.push(10);
            queue2.push(20);
        });

        let a = queue.pop();
        let b = queue.pop();

        producer.join().unwrap();

        let mut seen = [a, b];
        seen.sort_unstable();
        assert_eq!(seen, [10, 20]);
    });
}

/// Regression test: two producers racing to claim adjacent indices must
/// never let a consumer observe a slot before its producer's write has
/// actually landed. Before `write_index`/`read_index` were held across the
/// slot touch (not just the index bookkeeping), a producer that claimed
/// index 0 but was slow to write it could lose the race to post `ready`
/// against a producer that claimed index 1 and finished first, letting a
/// waiting consumer claim `read_index == 0` and read a still-uninitialized
/// slot — a genuine data race loom's `UnsafeCell` would flag, and (absent
/// the flag) a value loss/duplication this test's value-set check would
/// also catch.
#[test]
fn two_concurrent_producers_never_let_a_consumer_observe_an_unwritten_slot() {
    loom::model(|| {
        let queue = Arc::new(LoomQueue::new());

        let producer_a = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(1))
        };
        let producer_b = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(2))
        };

        let first = queue.pop();
        let second = queue.pop();

        producer_a.join().unwrap();
        producer_b.join().unwrap();

        let mut seen = [first, second];
        seen.sort_unstable();
        assert_eq!(seen, [1, 2], "every pushed value must be observed exactly once");
    });
}

/// Symmetric regression test on the pop side: two consumers racing to claim
/// adjacent indices must never let a producer's later write land on a slot
/// a consumer is still in the middle of reading.
#[test]
fn two_concurrent_consumers_never_race_a_producers_overwrite() {
    loom::model(|| {
        let queue = Arc::new(LoomQueue::new());
        queue.push(1);
        queue.push(2);

        let queue_a = Arc::clone(&queue);
        let consumer_a = thread::spawn(move || queue_a.pop());
        let queue_b = Arc::clone(&queue);
        let consumer_b = thread::spawn(move || queue_b.pop());

        let first = consumer_a.join().unwrap();
        let second = consumer_b.join().unwrap();

        let mut seen = [first, second];
        seen.sort_unstable();
        assert_eq!(seen, [1, 2], "every pushed value must be popped exactly once");
    });
}
