//! End-to-end scenarios exercising the queue as a whole, rather than a single
//! module in isolation.

use rt_fifo_queue::{InterruptContext, Queue, QueueError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn single_producer_single_consumer_preserves_order() {
    let queue = Arc::new(Queue::<u64>::new(64));
    const N: u64 = 5_000;

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            for i in 0..N {
                queue.push(i).unwrap();
            }
        })
    };

    let mut expected = 0u64;
    while expected < N {
        if let Ok(item) = queue.pop_timeout(Duration::from_secs(5)) {
            assert_eq!(item, expected, "FIFO order violated");
            expected += 1;
        }
    }
    producer.join().unwrap();
}

#[test]
fn multiple_producers_each_see_their_own_items_in_order() {
    const PRODUCERS: usize = 4;
    const PER_PRODUCER: u64 = 2_000;

    let queue = Arc::new(Queue::<(usize, u64)>::new(32));
    let mut handles = Vec::new();
    for id in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                queue.push((id, i)).unwrap();
            }
        }));
    }

    let mut last_seen = vec![None; PRODUCERS];
    let mut received = 0u64;
    while received < PRODUCERS as u64 * PER_PRODUCER {
        let (id, value) = queue.pop_timeout(Duration::from_secs(5)).unwrap();
        if let Some(last) = last_seen[id] {
            assert_eq!(value, last + 1, "producer {id} went out of order");
        } else {
            assert_eq!(value, 0);
        }
        last_seen[id] = Some(value);
        received += 1;
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn blocked_producer_unblocks_as_soon_as_a_slot_frees() {
    let queue = Arc::new(Queue::<u32>::new(1));
    queue.push(1).unwrap();

    let producer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.push(2))
    };

    // Give the producer a chance to actually block on the full queue.
    thread::sleep(Duration::from_millis(30));
    assert_eq!(queue.pop().unwrap(), 1);

    assert_eq!(producer.join().unwrap(), Ok(()));
    assert_eq!(queue.pop().unwrap(), 2);
}

#[test]
fn timed_operations_expire_without_corrupting_state() {
    let queue = Queue::<u32>::new(2);
    queue.push(1).unwrap();
    queue.push(2).unwrap();

    assert_eq!(
        queue.push_timeout(3, Duration::from_millis(15)),
        Err(QueueError::TimedOut)
    );
    assert_eq!(queue.len(), 2);

    assert_eq!(queue.pop().unwrap(), 1);
    assert_eq!(queue.pop().unwrap(), 2);

    assert_eq!(
        queue.pop_timeout(Duration::from_millis(15)),
        Err(QueueError::TimedOut)
    );
    assert!(queue.is_empty());
}

#[test]
fn blocking_calls_are_forbidden_from_an_interrupt_context() {
    let queue = Queue::<u32>::new(1);
    queue.push(1).unwrap();

    let _isr = InterruptContext::enter();
    // Queue is full: a blocking push from an ISR must fail fast, never block.
    assert_eq!(queue.push(2), Err(QueueError::OperationNotPermitted));
    assert_eq!(
        queue.push_timeout(2, Duration::from_millis(10)),
        Err(QueueError::OperationNotPermitted)
    );

    // Non-blocking operations remain legal from an interrupt context.
    assert_eq!(queue.try_push(2), Err(QueueError::WouldBlock));
    assert_eq!(queue.try_pop(), Ok(1));
}

#[test]
fn closing_drains_buffered_items_then_reports_interrupted() {
    let queue = Arc::new(Queue::<u32>::new(1));
    queue.push(1).unwrap();

    // A producer blocked waiting for room must be aborted by close, not
    // allowed to slip a new item in once the slot frees up.
    let blocked_push = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.push(2))
    };
    thread::sleep(Duration::from_millis(30));

    queue.close();
    assert!(queue.is_closed());
    assert_eq!(
        blocked_push.join().unwrap(),
        Err(QueueError::Interrupted),
        "a push blocked before close must not complete afterward"
    );

    assert_eq!(queue.try_push(99), Err(QueueError::Interrupted));

    // The item buffered before close still drains normally.
    assert_eq!(queue.pop(), Ok(1));
    assert_eq!(queue.try_pop(), Err(QueueError::Interrupted));
}

#[test]
fn scenario_1_fill_drain_then_would_block() {
    let queue = Queue::<u32>::new(4);
    queue.push(10).unwrap();
    queue.push(20).unwrap();
    queue.push(30).unwrap();
    queue.push(40).unwrap();

    assert_eq!(queue.pop().unwrap(), 10);
    assert_eq!(queue.pop().unwrap(), 20);
    assert_eq!(queue.pop().unwrap(), 30);
    assert_eq!(queue.pop().unwrap(), 40);

    assert_eq!(queue.try_pop(), Err(QueueError::WouldBlock));
}

#[test]
fn scenario_2_interleaved_push_pop_around_capacity() {
    let queue = Queue::<u32>::new(2);
    queue.push(1).unwrap();
    queue.push(2).unwrap();
    assert_eq!(queue.try_push(3), Err(QueueError::WouldBlock));

    assert_eq!(queue.pop().unwrap(), 1);
    queue.push(3).unwrap();

    assert_eq!(queue.pop().unwrap(), 2);
    assert_eq!(queue.pop().unwrap(), 3);
}

#[test]
fn scenario_3_earlier_blocked_consumer_receives_the_earlier_item() {
    let queue = Arc::new(Queue::<u32>::new(3));
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));

    let first_consumer = {
        let queue = Arc::clone(&queue);
        let order = Arc::clone(&order);
        thread::spawn(move || {
            let value = queue.pop().unwrap();
            order.lock().unwrap().push((0, value));
        })
    };
    // Ensure the first consumer is blocked and ticketed before the second.
    thread::sleep(Duration::from_millis(30));

    let second_consumer = {
        let queue = Arc::clone(&queue);
        let order = Arc::clone(&order);
        thread::spawn(move || {
            let value = queue.pop().unwrap();
            order.lock().unwrap().push((1, value));
        })
    };
    thread::sleep(Duration::from_millis(30));

    queue.push(7).unwrap();
    queue.push(8).unwrap();

    first_consumer.join().unwrap();
    second_consumer.join().unwrap();

    let order = order.lock().unwrap();
    assert_eq!(order.len(), 2);
    let earlier_blocked = order.iter().find(|(id, _)| *id == 0).unwrap();
    assert_eq!(earlier_blocked.1, 7, "the earlier-blocked consumer must receive the earlier item");
}

#[test]
fn scenario_4_swap_pop_destroys_the_previous_occupant_exactly_once() {
    use std::rc::Rc;

    let queue = Queue::<Rc<u32>>::new(1);
    let element = Rc::new(42);
    queue.push(Rc::clone(&element)).unwrap();

    let previous_occupant = Rc::new(0);
    let weak_previous = Rc::downgrade(&previous_occupant);
    let mut out = previous_occupant;

    queue.pop_into(&mut out).unwrap();

    assert_eq!(*out, 42);
    assert!(
        weak_previous.upgrade().is_none(),
        "the out-parameter's prior value must be destroyed exactly once, not leaked"
    );
}

#[test]
fn scenario_5_timed_pop_on_empty_queue_leaves_state_untouched() {
    let queue = Queue::<u32>::new(2);

    let started = Instant::now();
    assert_eq!(
        queue.pop_timeout(Duration::from_millis(10)),
        Err(QueueError::TimedOut)
    );
    assert!(started.elapsed() >= Duration::from_millis(10));
    assert!(queue.is_empty());

    queue.push(1).unwrap();
    assert_eq!(queue.pop().unwrap(), 1);
}

#[test]
fn scenario_6_stress_preserves_per_producer_order_across_many_consumers() {
    const PRODUCERS: usize = 2;
    const CONSUMERS: usize = 2;
    const PER_PRODUCER: u64 = 10_000;

    let queue = Arc::new(Queue::<(usize, u64)>::new(64));
    let mut producers = Vec::new();
    for id in 0..PRODUCERS {
        let queue = Arc::clone(&queue);
        producers.push(thread::spawn(move || {
            for i in 0..PER_PRODUCER {
                queue.push((id, i)).unwrap();
            }
        }));
    }

    let received = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mut consumers = Vec::new();
    for _ in 0..CONSUMERS {
        let queue = Arc::clone(&queue);
        let received = Arc::clone(&received);
        consumers.push(thread::spawn(move || loop {
            match queue.pop_timeout(Duration::from_secs(5)) {
                Ok(item) => received.lock().unwrap().push(item),
                Err(_) => break,
            }
        }));
    }

    for p in producers {
        p.join().unwrap();
    }
    // Let consumers drain whatever remains, then close so they can exit.
    while queue.len() > 0 {
        thread::sleep(Duration::from_millis(5));
    }
    queue.close();
    for c in consumers {
        c.join().unwrap();
    }

    let received = received.lock().unwrap();
    assert_eq!(received.len(), PRODUCERS * PER_PRODUCER as usize);

    let mut last_seen = vec![None; PRODUCERS];
    for &(id, seq) in received.iter() {
        if let Some(last) = last_seen[id] {
            assert_eq!(seq, last + 1, "producer {id} observed out of order");
        } else {
            assert_eq!(seq, 0);
        }
        last_seen[id] = Some(seq);
    }
}
