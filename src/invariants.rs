//! Debug assertion macros for queue and semaphore invariants.
//!
//! These macros provide runtime checks for the invariants documented in
//! `SPEC_FULL.md` §9. They are only active in debug builds
//! (`#[cfg(debug_assertions)]`), so there is zero overhead in release builds.

// =============================================================================
// INV-SEM-01: Semaphore Sum
// =============================================================================

/// Assert that the pop/push semaphore values sum to the ring capacity.
///
/// **Invariant**: `pop_semaphore.value() + push_semaphore.value() == N`
///
/// Used in: `QueueCore` after each completed push/pop, outside the critical
/// section (quiescent point).
macro_rules! debug_assert_semaphore_sum {
    ($pop_value:expr, $push_value:expr, $capacity:expr) => {
        debug_assert_eq!(
            $pop_value + $push_value,
            $capacity,
            "INV-SEM-01 violated: pop value {} + push value {} != capacity {}",
            $pop_value,
            $push_value,
            $capacity
        )
    };
}

// =============================================================================
// INV-SEQ-01: Bounded Index
// =============================================================================

/// Assert that a ring index is within bounds.
///
/// **Invariant**: `0 <= index < capacity`
///
/// Used in: `RingStorage::slot`, `QueueCore::advance`.
macro_rules! debug_assert_index_in_bounds {
    ($index:expr, $capacity:expr) => {
        debug_assert!(
            $index < $capacity,
            "INV-SEQ-01 violated: index {} out of bounds for capacity {}",
            $index,
            $capacity
        )
    };
}

// =============================================================================
// INV-SEQ-02: Wrap Discipline
// =============================================================================

/// Assert that advancing an index past the last slot wraps to zero.
///
/// **Invariant**: `advance(capacity - 1) == 0`
///
/// Used in: `QueueCore::advance`.
macro_rules! debug_assert_wraps_to_zero {
    ($old_index:expr, $new_index:expr, $capacity:expr) => {
        debug_assert!(
            $old_index + 1 != $capacity || $new_index == 0,
            "INV-SEQ-02 violated: advancing last index {} did not wrap to 0, got {}",
            $old_index,
            $new_index
        )
    };
}

// =============================================================================
// INV-CH-01: Ticket Monotonicity
// =============================================================================

/// Assert that the semaphore's "next to serve" ticket counter only increases.
///
/// **Invariant**: `new_next_to_serve >= old_next_to_serve`
///
/// Used in: `Semaphore::wait`/`try_wait` after a successful acquire.
macro_rules! debug_assert_ticket_monotonic {
    ($old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-CH-01 violated: next-to-serve ticket decreased from {} to {}",
            $old,
            $new
        )
    };
}

pub(crate) use debug_assert_index_in_bounds;
pub(crate) use debug_assert_semaphore_sum;
pub(crate) use debug_assert_ticket_monotonic;
pub(crate) use debug_assert_wraps_to_zero;
