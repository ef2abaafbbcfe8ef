//! Error types shared by the semaphore and the queue built on top of it.

use thiserror::Error;

/// Errors returned by [`crate::semaphore::Semaphore`] operations.
///
/// Mirrors the failure taxonomy a kernel counting semaphore exposes: a
/// non-blocking caller distinguishes "nothing available right now" from "gave
/// up after a deadline" from "the wait was aborted out from under me".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SemaphoreError {
    /// A non-blocking `try_wait` found the semaphore at zero, or a blocked
    /// waiter already holds the next ticket.
    #[error("semaphore would block")]
    WouldBlock,

    /// A timed wait exceeded its deadline before the semaphore became
    /// available.
    #[error("semaphore wait timed out")]
    TimedOut,

    /// The semaphore was closed while the caller was waiting, or was already
    /// closed when the call was made.
    #[error("semaphore was closed while waiting")]
    Interrupted,

    /// A blocking or timed wait was invoked from an interrupt context.
    #[error("blocking wait is not permitted from an interrupt context")]
    OperationNotPermitted,

    /// `post` was invoked while the semaphore was already at its configured
    /// maximum. The queue's invariants guarantee this never happens in
    /// practice; surfacing it as an error (rather than only an assertion)
    /// lets a release build fail safely instead of corrupting state.
    #[error("semaphore post overflowed its maximum value")]
    Overflow,
}

/// Errors returned by [`crate::queue::Queue`] operations.
///
/// A thin facade-level wrapper over [`SemaphoreError`]: the queue introduces
/// no failure mode of its own, but callers should not need to reach into the
/// semaphore module to match on queue-domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was full (push) or empty (pop) for a non-blocking call.
    #[error("queue would block")]
    WouldBlock,

    /// A timed push/pop exceeded its deadline.
    #[error("queue operation timed out")]
    TimedOut,

    /// The queue has been closed.
    #[error("queue is closed")]
    Interrupted,

    /// A blocking or timed push/pop was invoked from an interrupt context.
    #[error("blocking queue operation is not permitted from an interrupt context")]
    OperationNotPermitted,

    /// Internal semaphore invariant violation (see [`SemaphoreError::Overflow`]).
    #[error("queue semaphore overflowed its maximum value")]
    Overflow,
}

impl From<SemaphoreError> for QueueError {
    fn from(err: SemaphoreError) -> Self {
        match err {
            SemaphoreError::WouldBlock => Self::WouldBlock,
            SemaphoreError::TimedOut => Self::TimedOut,
            SemaphoreError::Interrupted => Self::Interrupted,
            SemaphoreError::OperationNotPermitted => Self::OperationNotPermitted,
            SemaphoreError::Overflow => Self::Overflow,
        }
    }
}
