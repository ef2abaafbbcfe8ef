//! A bounded, blocking, FIFO message queue for an embedded real-time kernel,
//! built from exactly two counting semaphores.
//!
//! One semaphore counts how many slots are currently initialized and ready
//! to pop; the other counts how many slots are currently free and ready to
//! push into. Pushing waits on the free-slot semaphore and posts the
//! ready-slot semaphore; popping does the reverse. FIFO order among
//! elements falls directly out of the ring's fixed push/pop index walk;
//! FIFO wake order among same-side blocked callers is a property of the
//! semaphore itself (see [`Semaphore`]).
//!
//! # Example
//!
//! ```
//! use rt_fifo_queue::Queue;
//!
//! let queue = Queue::<u32>::new(4);
//! queue.push(1).unwrap();
//! queue.push(2).unwrap();
//! assert_eq!(queue.pop().unwrap(), 1);
//! assert_eq!(queue.pop().unwrap(), 2);
//! ```
//!
//! # Interrupt contexts
//!
//! A real kernel forbids blocking and timed waits from an interrupt handler.
//! This crate has no hardware signal to detect that, so it is simulated with
//! [`InterruptContext`]: while a guard is alive on a thread, every blocking
//! or timed push/pop on that thread returns
//! [`QueueError::OperationNotPermitted`] instead of blocking. Non-blocking
//! `try_` calls are unaffected and are safe to use from a simulated
//! interrupt handler.

mod config;
mod core;
mod error;
mod interrupt;
mod invariants;
mod metrics;
mod queue;
mod semaphore;
mod storage;

pub use config::QueueConfig;
pub use error::{QueueError, SemaphoreError};
pub use interrupt::InterruptContext;
pub use metrics::{QueueMetrics, QueueMetricsSnapshot};
pub use queue::Queue;
pub use semaphore::Semaphore;
