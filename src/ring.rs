//! Lock-free single-producer single-consumer ring buffer.
//!
//! Fixed power-of-two capacity, one slot reserved to distinguish full from
//! empty. `head` is written only by the consumer, `tail` only by the
//! producer; each index and the slot array sit on their own cache lines so
//! the two threads never invalidate each other's line on index updates.
//!
//! [`SpscRing::split`] hands out a [`Producer`] and a [`Consumer`]; the
//! endpoints are `Send` but not `Clone`, so exactly one thread can push and
//! exactly one can pop.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Bounded SPSC queue storage. Construct with [`SpscRing::new`], then
/// [`split`](SpscRing::split) into the two endpoints.
pub struct SpscRing<T, const SIZE: usize> {
    /// Consumer read index.
    head: CachePadded<AtomicUsize>,
    /// Producer write index.
    tail: CachePadded<AtomicUsize>,
    buffer: CachePadded<[UnsafeCell<MaybeUninit<T>>; SIZE]>,
}

// Slots are only touched by the endpoint that owns the corresponding index
// range; the release store on the index publishes the slot write.
unsafe impl<T: Send, const SIZE: usize> Sync for SpscRing<T, SIZE> {}
unsafe impl<T: Send, const SIZE: usize> Send for SpscRing<T, SIZE> {}

impl<T, const SIZE: usize> SpscRing<T, SIZE> {
    const SIZE_CHECK: () = assert!(
        SIZE > 0 && (SIZE & (SIZE - 1)) == 0,
        "ring size must be a power of two"
    );
    const MASK: usize = SIZE - 1;

    pub fn new() -> Self {
        let () = Self::SIZE_CHECK;
        Self {
            head: CachePadded::new(AtomicUsize::new(0)),
            tail: CachePadded::new(AtomicUsize::new(0)),
            buffer: CachePadded::new(std::array::from_fn(|_| {
                UnsafeCell::new(MaybeUninit::uninit())
            })),
        }
    }

    /// Split into the producer and consumer endpoints.
    pub fn split(self) -> (Producer<T, SIZE>, Consumer<T, SIZE>) {
        let ring = Arc::new(self);
        (
            Producer { ring: ring.clone() },
            Consumer { ring },
        )
    }

    /// Usable capacity. One slot stays reserved.
    pub const fn capacity(&self) -> usize {
        SIZE - 1
    }

    /// Advisory item count; both indices are read relaxed.
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        tail.wrapping_sub(head) & Self::MASK
    }

    /// Advisory emptiness check.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Relaxed) == self.tail.load(Ordering::Relaxed)
    }
}

impl<T, const SIZE: usize> Default for SpscRing<T, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const SIZE: usize> Drop for SpscRing<T, SIZE> {
    fn drop(&mut self) {
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            unsafe { (*self.buffer[head].get()).assume_init_drop() };
            head = (head + 1) & Self::MASK;
        }
    }
}

/// Push endpoint. Owned by exactly one thread.
pub struct Producer<T, const SIZE: usize> {
    ring: Arc<SpscRing<T, SIZE>>,
}

impl<T, const SIZE: usize> Producer<T, SIZE> {
    /// Attempt to enqueue `item` without blocking.
    ///
    /// Returns the item back when the ring is full.
    pub fn try_push(&mut self, item: T) -> Result<(), T> {
        let ring = &*self.ring;
        // Only this endpoint writes tail.
        let tail = ring.tail.load(Ordering::Relaxed);
        let next = (tail + 1) & SpscRing::<T, SIZE>::MASK;
        // Acquire pairs with the consumer's release store of head.
        if next == ring.head.load(Ordering::Acquire) {
            return Err(item);
        }
        unsafe { (*ring.buffer[tail].get()).write(item) };
        // Release publishes the slot write to the consumer.
        ring.tail.store(next, Ordering::Release);
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// Pop endpoint. Owned by exactly one thread.
pub struct Consumer<T, const SIZE: usize> {
    ring: Arc<SpscRing<T, SIZE>>,
}

impl<T, const SIZE: usize> Consumer<T, SIZE> {
    /// Attempt to dequeue the oldest item without blocking.
    pub fn try_pop(&mut self) -> Option<T> {
        let ring = &*self.ring;
        // Only this endpoint writes head.
        let head = ring.head.load(Ordering::Relaxed);
        // Acquire pairs with the producer's release store of tail.
        if head == ring.tail.load(Ordering::Acquire) {
            return None;
        }
        let item = unsafe { (*ring.buffer[head].get()).assume_init_read() };
        // Release hands the slot back to the producer.
        ring.head
            .store((head + 1) & SpscRing::<T, SIZE>::MASK, Ordering::Release);
        Some(item)
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
