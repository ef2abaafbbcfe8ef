//! Simulated interrupt context for enforcing the blocking-wait restriction.
//!
//! A real kernel knows statically (or via a CPU mode register) whether the
//! current code is executing as a thread or as an interrupt handler. This
//! crate has no such hardware signal to consult, so it models the same
//! restriction with a thread-local flag: wrap the body of a simulated ISR in
//! [`InterruptContext::enter`], and any blocking or timed semaphore wait
//! invoked underneath it returns [`crate::error::SemaphoreError::OperationNotPermitted`]
//! instead of blocking.

use std::cell::Cell;

thread_local! {
    static INTERRUPT_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Returns `true` if the current thread is inside an [`InterruptContext`] guard.
#[inline]
pub(crate) fn in_interrupt_context() -> bool {
    INTERRUPT_DEPTH.with(|depth| depth.get() > 0)
}

/// RAII guard marking the current thread as executing in an interrupt context.
///
/// While a guard is alive on a thread, [`crate::semaphore::Semaphore::wait`],
/// [`crate::semaphore::Semaphore::try_wait_for`], and
/// [`crate::semaphore::Semaphore::try_wait_until`] — along with the queue
/// operations built on them — return `OperationNotPermitted` immediately
/// rather than blocking. [`crate::semaphore::Semaphore::try_wait`] and
/// `post` are unaffected, matching the restriction that interrupt handlers
/// may only use the non-blocking variants.
///
/// Guards nest: entering one while another is already active on the same
/// thread is harmless, and the context is only cleared once the outermost
/// guard is dropped.
///
/// # Example
///
/// ```
/// use rt_fifo_queue::InterruptContext;
///
/// let _isr = InterruptContext::enter();
/// // code here runs "as if" from an interrupt handler
/// ```
#[must_use = "the interrupt context is only active while this guard is alive"]
pub struct InterruptContext {
    _private: (),
}

impl InterruptContext {
    /// Marks the current thread as an interrupt context until the returned
    /// guard is dropped.
    pub fn enter() -> Self {
        INTERRUPT_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self { _private: () }
    }
}

impl Drop for InterruptContext {
    fn drop(&mut self) {
        INTERRUPT_DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_in_interrupt_context_by_default() {
        assert!(!in_interrupt_context());
    }

    #[test]
    fn guard_sets_and_clears_the_flag() {
        assert!(!in_interrupt_context());
        {
            let _guard = InterruptContext::enter();
            assert!(in_interrupt_context());
        }
        assert!(!in_interrupt_context());
    }

    #[test]
    fn flag_is_thread_local() {
        let _guard = InterruptContext::enter();
        assert!(in_interrupt_context());

        let handle = std::thread::spawn(|| in_interrupt_context());
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn nested_guards_stay_active_until_the_outermost_drops() {
        assert!(!in_interrupt_context());
        let outer = InterruptContext::enter();
        {
            let inner = InterruptContext::enter();
            assert!(in_interrupt_context());
            drop(inner);
            assert!(
                in_interrupt_context(),
                "dropping the inner guard must not clear the flag while the outer is still alive"
            );
        }
        drop(outer);
        assert!(!in_interrupt_context());
    }
}
