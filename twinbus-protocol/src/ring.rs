//! Single-producer/single-consumer byte queue
//!
//! Staging area for the pull bus: frames are queued here by the encoder
//! and drained into the next bus transaction by the scheduler. Producer
//! and consumer may live in different execution contexts (main loop and
//! interrupt handler), so the queue shares nothing but its two indices.
//!
//! Both indices run freely and wrap at `usize::MAX`; the slot is the
//! index masked by `N - 1`. `head - tail` is therefore the fill level and
//! all `N` slots are usable.

use portable_atomic::{AtomicU8, AtomicUsize, Ordering};

/// Fixed-capacity lock-free byte ring
///
/// `N` must be a power of two; any other value fails to compile when
/// [`RingBuffer::new`] is instantiated.
///
/// Only one context may call [`RingBuffer::push`] and only one context
/// may call [`RingBuffer::pop`].
#[derive(Debug)]
pub struct RingBuffer<const N: usize> {
    slots: [AtomicU8; N],
    /// Total bytes ever pushed (producer-owned)
    head: AtomicUsize,
    /// Total bytes ever popped (consumer-owned)
    tail: AtomicUsize,
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingBuffer<N> {
    const CAPACITY_IS_POWER_OF_TWO: () =
        assert!(N.is_power_of_two(), "RingBuffer capacity must be a power of two");

    #[allow(clippy::declare_interior_mutable_const)]
    const EMPTY_SLOT: AtomicU8 = AtomicU8::new(0);

    const MASK: usize = N - 1;

    /// Create an empty queue
    ///
    /// `const` so the queue can live in a `static` shared between the
    /// producer and consumer contexts.
    #[allow(clippy::let_unit_value)]
    pub const fn new() -> Self {
        let () = Self::CAPACITY_IS_POWER_OF_TWO;
        Self {
            slots: [Self::EMPTY_SLOT; N],
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Number of bytes the queue can hold
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Append a byte
    ///
    /// Returns false and drops the byte when the queue is full.
    pub fn push(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head.wrapping_sub(tail) >= N {
            return false;
        }
        self.slots[head & Self::MASK].store(byte, Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
        true
    }

    /// Remove the oldest byte
    pub fn pop(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let byte = self.slots[tail & Self::MASK].load(Ordering::Relaxed);
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Some(byte)
    }

    /// Returns true if no bytes are queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes currently queued
    ///
    /// A snapshot; the other context may change it right after.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail)
    }
}
