//! Debug assertion macros for ring buffer invariants.
//!
//! They are only active in debug builds (`#[cfg(debug_assertions)]`), so there
//! is zero overhead in release builds.
//!
//! Used by `RingBuffer<T, N>` and the consumer state machine in `host`.

// =============================================================================
// INDEX BOUNDS: 0 ≤ front < N, 0 ≤ back < N
// =============================================================================

/// Assert that a freshly published index stays inside the slot array.
///
/// Used in: `enqueue_as_producer()` for `back`, `dequeue_as_consumer()` for `front`
macro_rules! debug_assert_index_in_bounds {
    ($name:literal, $index:expr, $slots:expr) => {
        debug_assert!(
            $index < $slots,
            "index bound violated: {} = {} but ring has {} slots",
            $name,
            $index,
            $slots
        )
    };
}

// =============================================================================
// BOUNDED COUNT: at most N - 1 live items
// =============================================================================

/// Assert that the number of live items never exceeds the usable capacity.
///
/// **Invariant**: `(back + 1 - front) mod N ≤ N - 1`. The slot after `back`
/// is the sacrificed one whenever the ring is full.
///
/// Used in: `enqueue_as_producer()` after publishing `back`
macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "bounded count violated: {} live items exceed usable capacity {}",
            $count,
            $capacity
        )
    };
}

// =============================================================================
// SENTINEL IS TERMINAL
// =============================================================================

/// Assert that the consumer never takes another item once it saw the sentinel.
///
/// Used in: `ConsumerState::on_item()`
macro_rules! debug_assert_not_terminated {
    ($terminated:expr, $value:expr) => {
        debug_assert!(
            !$terminated,
            "consumer read {} after the end-of-stream sentinel",
            $value
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_index_in_bounds;
pub(crate) use debug_assert_not_terminated;
