use crate::invariants::{debug_assert_bounded_count, debug_assert_index_in_bounds};
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::fmt;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

// =============================================================================
// MEMORY ORDERING & SINGLE-WRITER DISCIPLINE
// =============================================================================
//
// The ring keeps two indices into N slots and never stores a count:
//
// - `front`: the next slot to read.   Written ONLY by the consumer.
// - `back`:  the last slot written.    Written ONLY by the producer.
//
// Empty ⟺ front == back + 1 (mod N), Full ⟺ front == back + 2 (mod N). The
// slot after `back` is always unused when full, so the two states stay apart.
//
// **Producer (enqueue):**
// 1. Load `back` with Relaxed (only the producer writes it)
// 2. Load `front` with Acquire (synchronizes with the consumer's Release,
//    so the slot it just vacated is really free)
// 3. Write the slot at back + 1 (no ordering needed - protected by protocol)
// 4. Store `back` with Release (publishes the slot to the consumer)
//
// **Consumer (dequeue):**
// 1. Load `front` with Relaxed (only the consumer writes it)
// 2. Load `back` with Acquire (synchronizes with the producer's Release)
// 3. Read and clear the slot at `front` (protected by protocol)
// 4. Store `front` with Release (hands the slot back to the producer)
//
// No read-modify-write atomics and no locks are involved. The single-writer
// rule is what makes this sound, and it is carried by the handle types: one
// `Producer` and one `Consumer` per ring, neither of them `Clone`. Across a
// process boundary no compiler can see the other side, so `attach` is
// `unsafe` and the caller takes over the rule.
//
// =============================================================================

/// Compile-time check that the ring has room for at least one item.
const fn assert_slot_count<const N: usize>() {
    assert!(N >= 2, "RingBuffer needs at least 2 slots (one is always left empty)");
}

/// Fixed-capacity circular buffer with `N` slots and `N - 1` usable items.
///
/// The struct is `#[repr(C)]` and holds no pointers, so it can be placed in a
/// memory region shared by two processes (see `SharedRegion`).
///
/// # Memory Layout
///
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │ front: CachePadded<AtomicUsize>  ← Consumer writes           │
/// ├──────────────────────────────────────────────────────────────┤
/// │ back:  CachePadded<AtomicUsize>  ← Producer writes           │
/// ├──────────────────────────────────────────────────────────────┤
/// │ slots: [UnsafeCell<T>; N]        ← one writer per slot       │
/// └──────────────────────────────────────────────────────────────┘
/// ```
#[repr(C)]
pub struct RingBuffer<T, const N: usize> {
    front: CachePadded<AtomicUsize>,
    back: CachePadded<AtomicUsize>,
    slots: [UnsafeCell<T>; N],
}

// Safety: the only shared mutation goes through `Producer` / `Consumer`, which
// follow the single-writer protocol above. Slot values move between threads.
unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    /// Creates an empty ring (`front = 1`, `back = 0`) with cleared slots.
    pub fn new() -> Self {
        const { assert_slot_count::<N>() };

        Self {
            front: CachePadded::new(AtomicUsize::new(1)),
            back: CachePadded::new(AtomicUsize::new(0)),
            slots: std::array::from_fn(|_| UnsafeCell::new(T::default())),
        }
    }

    /// Resets the ring to the empty state and clears every slot.
    ///
    /// Requires exclusive access, so no handle can be alive.
    pub fn init(&mut self) {
        *self.front.get_mut() = 1;
        *self.back.get_mut() = 0;
        for slot in &mut self.slots {
            *slot.get_mut() = T::default();
        }
    }

    /// Splits the ring into its producer and consumer handles.
    ///
    /// The mutable borrow guarantees exactly one handle of each role exists
    /// and that nobody can reinitialize the ring while they are alive.
    pub fn split(&mut self) -> (Producer<'_, T, N>, Consumer<'_, T, N>) {
        let ring: &Self = self;
        (Producer { ring }, Consumer { ring })
    }

    /// Adds an item at the back. Returns the item if the ring is full.
    ///
    /// Single-context form; concurrent producers go through [`Producer`].
    pub fn try_enqueue(&mut self, item: T) -> Result<(), T> {
        // SAFETY: `&mut self` excludes every other producer and consumer.
        unsafe { self.enqueue_as_producer(item) }
    }

    /// Removes the oldest item. Returns `None` if the ring is empty.
    ///
    /// Single-context form; a concurrent consumer goes through [`Consumer`].
    pub fn try_dequeue(&mut self) -> Option<T> {
        // SAFETY: `&mut self` excludes every other producer and consumer.
        unsafe { self.dequeue_as_consumer() }
    }

    /// Copies out indices and slot contents for diagnostics.
    pub fn snapshot(&mut self) -> RingSnapshot<T> {
        RingSnapshot {
            front: *self.front.get_mut(),
            back: *self.back.get_mut(),
            slots: self.slots.iter_mut().map(|slot| *slot.get_mut()).collect(),
        }
    }

    // ---------------------------------------------------------------------
    // PROTOCOL (shared by the `&mut self` forms and the handles)
    // ---------------------------------------------------------------------

    /// # Safety
    ///
    /// The caller must be the only context acting as producer on this ring.
    unsafe fn enqueue_as_producer(&self, item: T) -> Result<(), T> {
        let back = self.back.load(Ordering::Relaxed);
        let front = self.front.load(Ordering::Acquire);

        if Self::full(front, back) {
            return Err(item);
        }

        let next = Self::next(back);
        // SAFETY: the slot after `back` is outside the live range [front, back]
        // because the ring is not full, so the consumer is not reading it. Only
        // the producer writes slots, and only one producer exists.
        unsafe {
            *self.slots[next].get() = item;
        }
        self.back.store(next, Ordering::Release);

        debug_assert_index_in_bounds!("back", next, N);
        debug_assert_bounded_count!(Self::count(front, next), N - 1);

        Ok(())
    }

    /// # Safety
    ///
    /// The caller must be the only context acting as consumer on this ring.
    unsafe fn dequeue_as_consumer(&self) -> Option<T> {
        let front = self.front.load(Ordering::Relaxed);
        let back = self.back.load(Ordering::Acquire);

        if Self::empty(front, back) {
            return None;
        }

        // SAFETY: `front` is inside the live range published by the Acquire
        // load of `back`; the producer will not touch this slot until `front`
        // moves past it. Clearing is only for diagnostics.
        let item = unsafe { ptr::replace(self.slots[front].get(), T::default()) };

        let next = Self::next(front);
        self.front.store(next, Ordering::Release);

        debug_assert_index_in_bounds!("front", next, N);

        Some(item)
    }
}

impl<T, const N: usize> RingBuffer<T, N> {
    /// Total number of slots (`N`).
    #[inline]
    pub const fn slot_count(&self) -> usize {
        N
    }

    /// Usable capacity (`N - 1`).
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Index of the next item to be removed.
    #[inline]
    pub fn front(&self) -> usize {
        self.front.load(Ordering::Acquire)
    }

    /// Index of the most recently inserted item.
    #[inline]
    pub fn back(&self) -> usize {
        self.back.load(Ordering::Acquire)
    }

    /// Returns true if the ring holds no items.
    #[inline]
    pub fn is_empty(&self) -> bool {
        Self::empty(self.front(), self.back())
    }

    /// Returns true if the ring holds `N - 1` items.
    #[inline]
    pub fn is_full(&self) -> bool {
        Self::full(self.front(), self.back())
    }

    /// Returns the number of items in the ring.
    ///
    /// Exact when called by either role; a third observer may see a value
    /// that was already stale when returned.
    #[inline]
    pub fn len(&self) -> usize {
        Self::count(self.front(), self.back())
    }

    #[inline]
    const fn next(index: usize) -> usize {
        (index + 1) % N
    }

    #[inline]
    const fn empty(front: usize, back: usize) -> bool {
        front == (back + 1) % N
    }

    #[inline]
    const fn full(front: usize, back: usize) -> bool {
        (back + 2) % N == front
    }

    #[inline]
    const fn count(front: usize, back: usize) -> usize {
        (back + 1 + N - front) % N
    }
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> fmt::Debug for RingBuffer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBuffer")
            .field("front", &self.front())
            .field("back", &self.back())
            .field("slots", &N)
            .finish()
    }
}

// ---------------------------------------------------------------------
// ROLE HANDLES
// ---------------------------------------------------------------------

/// Producer side of a [`RingBuffer`]. Writes `back` and the slot it points at.
///
/// Intentionally not `Clone`: a second producer would race on `back`.
pub struct Producer<'a, T, const N: usize> {
    ring: &'a RingBuffer<T, N>,
}

impl<'a, T: Copy + Default, const N: usize> Producer<'a, T, N> {
    /// Creates a producer handle without borrowing the ring mutably.
    ///
    /// # Safety
    ///
    /// No other `Producer` for this ring may exist in this or any other
    /// process for the lifetime of the returned handle, and the ring must
    /// not be reinitialized meanwhile.
    pub unsafe fn attach(ring: &'a RingBuffer<T, N>) -> Self {
        Self { ring }
    }

    /// Adds an item at the back. Returns the item if the ring is full.
    #[inline]
    pub fn try_enqueue(&mut self, item: T) -> Result<(), T> {
        // SAFETY: this handle is the only producer (see `split` / `attach`).
        unsafe { self.ring.enqueue_as_producer(item) }
    }
}

impl<T, const N: usize> Producer<'_, T, N> {
    /// Returns true if the ring is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Returns true if the ring is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns the number of items in the ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Usable capacity of the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

/// Consumer side of a [`RingBuffer`]. Writes `front` and the slot it points at.
///
/// Intentionally not `Clone`: a second consumer would race on `front`.
pub struct Consumer<'a, T, const N: usize> {
    ring: &'a RingBuffer<T, N>,
}

impl<'a, T: Copy + Default, const N: usize> Consumer<'a, T, N> {
    /// Creates a consumer handle without borrowing the ring mutably.
    ///
    /// # Safety
    ///
    /// No other `Consumer` for this ring may exist in this or any other
    /// process for the lifetime of the returned handle, and the ring must
    /// not be reinitialized meanwhile.
    pub unsafe fn attach(ring: &'a RingBuffer<T, N>) -> Self {
        Self { ring }
    }

    /// Removes the oldest item. Returns `None` if the ring is empty.
    #[inline]
    pub fn try_dequeue(&mut self) -> Option<T> {
        // SAFETY: this handle is the only consumer (see `split` / `attach`).
        unsafe { self.ring.dequeue_as_consumer() }
    }

    /// Copies out indices and the items waiting in the ring.
    ///
    /// Only the live range `[front, back]` is read; the producer may be
    /// writing any other slot, so those are reported as `T::default()`,
    /// which is what they hold once consumed.
    pub fn snapshot(&self) -> RingSnapshot<T> {
        let front = self.ring.front.load(Ordering::Relaxed);
        let back = self.ring.back.load(Ordering::Acquire);

        let mut slots = vec![T::default(); N];
        for offset in 0..RingBuffer::<T, N>::count(front, back) {
            let index = (front + offset) % N;
            // SAFETY: the slot is inside the live range published by the
            // Acquire load of `back`; only this consumer may change it.
            slots[index] = unsafe { *self.ring.slots[index].get() };
        }

        RingSnapshot { front, back, slots }
    }
}

impl<T, const N: usize> Consumer<'_, T, N> {
    /// Returns true if the ring is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns true if the ring is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Returns the number of items in the ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Usable capacity of the ring.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }
}

// ---------------------------------------------------------------------
// DIAGNOSTICS
// ---------------------------------------------------------------------

/// Point-in-time copy of a ring, taken with exclusive access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSnapshot<T> {
    pub front: usize,
    pub back: usize,
    pub slots: Vec<T>,
}

impl<T> RingSnapshot<T> {
    fn render(
        &self,
        f: &mut fmt::Formatter<'_>,
        cell: impl Fn(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
    ) -> fmt::Result {
        write!(f, "Buffer [{:02}..{:02}] =", self.front, self.back)?;
        for (index, value) in self.slots.iter().enumerate() {
            let open = if index == self.front { '[' } else { ' ' };
            let close = if index == self.back { ']' } else { ' ' };
            write!(f, " {open}")?;
            cell(f, value)?;
            write!(f, "{close}")?;
        }
        Ok(())
    }
}

/// Renders every slot; `[` marks `front`, `]` marks `back`.
impl<T: fmt::Display> fmt::Display for RingSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, |f, value| write!(f, "{value:>2}"))
    }
}

/// Same layout as `Display`, each slot as 8 hex digits (`{:x}`).
impl<T: fmt::LowerHex> fmt::LowerHex for RingSnapshot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, |f, value| write!(f, "{value:08x}"))
    }
}
