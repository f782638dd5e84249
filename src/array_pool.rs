//! A bucketed pool of reusable heap-allocated buffers.

use core::fmt;
use std::sync::{Mutex, OnceLock};

/// Smallest buffer length the pool hands out; requests below it are rounded
/// up to this size class.
const MIN_BUFFER_LENGTH: usize = 16;

/// Largest buffer length a pool will ever agree to manage.
const MAX_BUFFER_LENGTH: usize = 1 << 30;

/// Default cap on the length of pooled buffers (1 MiB of elements).
const DEFAULT_MAX_BUFFER_LENGTH: usize = 1024 * 1024;

/// Default number of buffers retained per size class.
const DEFAULT_MAX_BUFFERS_PER_BUCKET: usize = 50;

/// Maps a requested length to the index of the bucket whose size class
/// covers it. Size classes are the powers of two from 16 up, so bucket `i`
/// holds buffers of length `16 << i`.
///
/// `length` must be non-zero.
const fn bucket_index(length: usize) -> usize {
    // Rounds up to the next power of two >= 16, then log-maps it so that
    // lengths 1..=16 land in bucket 0, 17..=32 in bucket 1, and so on.
    (((length - 1) | (MIN_BUFFER_LENGTH - 1)).ilog2() as usize) - 3
}

/// One size class: a fixed array of slots guarded by a mutex, filled from
/// the bottom. `count` is the cursor one past the last occupied slot.
struct Slots<T> {
    buffers: Box<[Option<Box<[T]>>]>,
    count: usize,
}

struct Bucket<T> {
    /// Length of every buffer this bucket stores and creates.
    buffer_length: usize,
    slots: Mutex<Slots<T>>,
}

impl<T> Bucket<T> {
    fn new(buffer_length: usize, capacity: usize) -> Self {
        Bucket {
            buffer_length,
            slots: Mutex::new(Slots {
                buffers: (0..capacity).map(|_| None).collect(),
                count: 0,
            }),
        }
    }

    /// Takes a pooled buffer, if one is available.
    fn pop(&self) -> Option<Box<[T]>> {
        let mut slots = self.slots.lock().expect("`Bucket::pop()` - lock poisoned!");
        if slots.count == 0 {
            return None;
        }
        slots.count -= 1;
        let count = slots.count;
        slots.buffers[count].take()
    }

    /// Stores `buffer` if a slot is free; otherwise the buffer is dropped.
    fn push(&self, buffer: Box<[T]>) {
        let mut slots = self.slots.lock().expect("`Bucket::push()` - lock poisoned!");
        if slots.count < slots.buffers.len() {
            let count = slots.count;
            slots.buffers[count] = Some(buffer);
            slots.count += 1;
        }
    }
}

/// A pool of reusable buffers, bucketed by size class.
///
/// [`rent`](ArrayPool::rent) hands out a `Box<[T]>` whose length is *at
/// least* the requested length, and [`recycle`](ArrayPool::recycle) gives it
/// back for a later rent to reuse, avoiding repeated heap traffic in code
/// that continually needs short-lived scratch buffers.
///
/// Size classes are the powers of two from 16 elements up to the configured
/// maximum; a request is served from the smallest class that covers it.
/// Requests beyond the maximum are still satisfied, with an exact-size
/// allocation that the pool never retains.
///
/// The pool is safe to share across threads (`rent` and `recycle` take
/// `&self`); each bucket is guarded by its own mutex, held only for the slot
/// bookkeeping. For the common byte case a process-wide instance is
/// available through [`ArrayPool::shared`].
///
/// The pool is strictly advisory: buffers are plain owned slices, so
/// forgetting to recycle one simply drops it, and recycling a buffer that
/// did not come from the pool is accepted (it is retained only if its length
/// matches a size class exactly).
///
/// # Examples
///
/// ```
/// use rootstock::ArrayPool;
///
/// let pool: ArrayPool<u8> = ArrayPool::default();
///
/// let buffer = pool.rent(100);
/// assert!(buffer.len() >= 100);
/// // ... use the buffer as scratch space ...
/// pool.recycle(buffer, false);
/// ```
pub struct ArrayPool<T> {
    buckets: Box<[Bucket<T>]>,
}

impl<T> ArrayPool<T> {
    /// Makes a new pool.
    ///
    /// `max_buffer_length` is the largest buffer the pool will retain; it is
    /// clamped to `[16, 2^30]`. `max_buffers_per_bucket` caps how many
    /// buffers each size class keeps around.
    ///
    /// # Panics
    ///
    /// Panics if `max_buffers_per_bucket` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::ArrayPool;
    ///
    /// // A small pool: classes of 16, 32 and 64, two buffers retained each.
    /// let pool: ArrayPool<u64> = ArrayPool::new(64, 2);
    /// assert_eq!(pool.rent(40).len(), 64);
    /// ```
    #[must_use]
    pub fn new(max_buffer_length: usize, max_buffers_per_bucket: usize) -> Self {
        assert!(max_buffers_per_bucket > 0, "`ArrayPool::new()` - `max_buffers_per_bucket` is zero!");
        let max_buffer_length = max_buffer_length.clamp(MIN_BUFFER_LENGTH, MAX_BUFFER_LENGTH);
        let buckets = (0..=bucket_index(max_buffer_length))
            .map(|i| Bucket::new(MIN_BUFFER_LENGTH << i, max_buffers_per_bucket))
            .collect();
        ArrayPool { buckets }
    }

    /// Largest buffer length this pool retains.
    #[must_use]
    pub fn max_buffer_length(&self) -> usize {
        self.buckets[self.buckets.len() - 1].buffer_length
    }
}

impl<T: Default + Clone> ArrayPool<T> {
    /// Rents a buffer of at least `length` elements.
    ///
    /// A pooled buffer is reused when the covering size class (or the next
    /// one up) has one; otherwise a fresh buffer of the class size is
    /// allocated. Fresh buffers are filled with `T::default()`; reused ones
    /// hold whatever the previous user left behind unless it was recycled
    /// with `clear` set.
    ///
    /// Renting zero elements returns an empty buffer without touching the
    /// pool, and renting more than [`max_buffer_length`](ArrayPool::max_buffer_length)
    /// elements returns an exact-size buffer the pool will never retain.
    ///
    /// # Complexity
    ///
    /// O(1) plus the allocation on a pool miss.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::ArrayPool;
    ///
    /// let pool: ArrayPool<u32> = ArrayPool::default();
    /// assert_eq!(pool.rent(0).len(), 0);
    /// assert_eq!(pool.rent(10).len(), 16);
    /// assert_eq!(pool.rent(100).len(), 128);
    /// ```
    #[must_use]
    pub fn rent(&self, length: usize) -> Box<[T]> {
        if length == 0 {
            return Box::from([]);
        }

        let index = bucket_index(length);
        if index >= self.buckets.len() {
            // Beyond the largest class: exact size, never pooled.
            return vec![T::default(); length].into_boxed_slice();
        }

        // Try the covering class first, then settle for a buffer one class
        // larger rather than allocating.
        if let Some(buffer) = self.buckets[index].pop() {
            return buffer;
        }
        if let Some(buffer) = self.buckets.get(index + 1).and_then(Bucket::pop) {
            return buffer;
        }
        vec![T::default(); self.buckets[index].buffer_length].into_boxed_slice()
    }

    /// Returns a buffer to the pool for a later [`rent`](ArrayPool::rent)
    /// to reuse.
    ///
    /// With `clear` set, the buffer is overwritten with `T::default()`
    /// first; use this when the contents are sensitive or when reusers
    /// expect zeroed scratch space. Clearing happens outside any lock.
    ///
    /// The buffer is silently dropped instead of retained when its length
    /// is not exactly a size class of this pool (zero included) or when the
    /// class's bucket is already full.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::ArrayPool;
    ///
    /// let pool: ArrayPool<u8> = ArrayPool::default();
    /// let mut buffer = pool.rent(16);
    /// buffer.fill(0xA5);
    /// pool.recycle(buffer, true);
    ///
    /// // The cleared buffer comes back zeroed.
    /// assert!(pool.rent(16).iter().all(|&byte| byte == 0));
    /// ```
    pub fn recycle(&self, mut buffer: Box<[T]>, clear: bool) {
        if buffer.is_empty() {
            return;
        }
        let index = bucket_index(buffer.len());
        let Some(bucket) = self.buckets.get(index) else {
            return;
        };
        if bucket.buffer_length != buffer.len() {
            // Not one of ours (or truncated along the way): pooling it
            // would hand later renters a short buffer.
            return;
        }
        if clear {
            buffer.fill(T::default());
        }
        bucket.push(buffer);
    }
}

impl ArrayPool<u8> {
    /// A process-wide byte pool, created on first use.
    ///
    /// # Examples
    ///
    /// ```
    /// use rootstock::ArrayPool;
    ///
    /// let buffer = ArrayPool::shared().rent(4096);
    /// ArrayPool::shared().recycle(buffer, false);
    /// ```
    #[must_use]
    pub fn shared() -> &'static ArrayPool<u8> {
        static SHARED: OnceLock<ArrayPool<u8>> = OnceLock::new();
        SHARED.get_or_init(ArrayPool::default)
    }
}

impl<T> Default for ArrayPool<T> {
    /// Creates a pool with the default limits: buffers up to 1 MiB of
    /// elements, 50 retained per size class.
    fn default() -> Self {
        ArrayPool::new(DEFAULT_MAX_BUFFER_LENGTH, DEFAULT_MAX_BUFFERS_PER_BUCKET)
    }
}

impl<T> fmt::Debug for ArrayPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayPool")
            .field("buckets", &self.buckets.len())
            .field("max_buffer_length", &self.max_buffer_length())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_index_maps_size_classes() {
        assert_eq!(bucket_index(1), 0);
        assert_eq!(bucket_index(16), 0);
        assert_eq!(bucket_index(17), 1);
        assert_eq!(bucket_index(32), 1);
        assert_eq!(bucket_index(33), 2);
        assert_eq!(bucket_index(1024), 6);
        assert_eq!(bucket_index(1025), 7);
    }

    #[test]
    fn rent_rounds_up_to_the_class_size() {
        let pool: ArrayPool<u8> = ArrayPool::default();
        assert_eq!(pool.rent(1).len(), 16);
        assert_eq!(pool.rent(16).len(), 16);
        assert_eq!(pool.rent(17).len(), 32);
        assert_eq!(pool.rent(1000).len(), 1024);
    }

    #[test]
    fn rent_zero_is_empty() {
        let pool: ArrayPool<u8> = ArrayPool::default();
        assert_eq!(pool.rent(0).len(), 0);
    }

    #[test]
    fn recycled_buffer_is_reused() {
        let pool: ArrayPool<u8> = ArrayPool::new(1024, 4);
        let buffer = pool.rent(64);
        let address = buffer.as_ptr();
        pool.recycle(buffer, false);
        assert_eq!(pool.rent(64).as_ptr(), address);
    }

    #[test]
    fn off_class_buffers_are_dropped() {
        let pool: ArrayPool<u8> = ArrayPool::new(1024, 4);
        // 20 is covered by the 32 class but is not a class size itself.
        let odd = vec![0u8; 20].into_boxed_slice();
        let address = odd.as_ptr();
        pool.recycle(odd, false);
        assert_ne!(pool.rent(20).as_ptr(), address);
    }

    #[test]
    fn bucket_capacity_limits_retention() {
        let pool: ArrayPool<u8> = ArrayPool::new(1024, 2);
        let rented: Vec<_> = (0..3).map(|_| pool.rent(16)).collect();
        let addresses: Vec<_> = rented.iter().map(|buffer| buffer.as_ptr()).collect();
        for buffer in rented {
            pool.recycle(buffer, false);
        }
        // Only two fit in the bucket; the third rent allocates fresh.
        let reused: Vec<_> = (0..3).map(|_| pool.rent(16)).collect();
        let reused_count = reused.iter().filter(|buffer| addresses.contains(&buffer.as_ptr())).count();
        assert_eq!(reused_count, 2);
    }

    #[test]
    fn rent_falls_back_one_class_up() {
        let pool: ArrayPool<u8> = ArrayPool::new(1024, 4);
        let larger = pool.rent(32);
        let address = larger.as_ptr();
        pool.recycle(larger, false);
        // The 16 class is empty, so the 32 class buffer is handed out.
        let buffer = pool.rent(10);
        assert_eq!(buffer.len(), 32);
        assert_eq!(buffer.as_ptr(), address);
    }

    #[test]
    fn oversize_requests_are_exact_and_never_pooled() {
        let pool: ArrayPool<u8> = ArrayPool::new(1024, 4);
        let big = pool.rent(2000);
        assert_eq!(big.len(), 2000);
        let address = big.as_ptr();
        pool.recycle(big, false);
        assert_ne!(pool.rent(2000).as_ptr(), address);
    }

    #[test]
    fn clear_scrubs_before_pooling() {
        let pool: ArrayPool<u8> = ArrayPool::new(1024, 4);
        let mut buffer = pool.rent(16);
        buffer.fill(0xFF);
        let address = buffer.as_ptr();
        pool.recycle(buffer, true);
        let buffer = pool.rent(16);
        assert_eq!(buffer.as_ptr(), address);
        assert!(buffer.iter().all(|&byte| byte == 0));
    }

    #[test]
    fn dirty_recycle_keeps_contents() {
        let pool: ArrayPool<u8> = ArrayPool::new(1024, 4);
        let mut buffer = pool.rent(16);
        buffer.fill(0xFF);
        pool.recycle(buffer, false);
        assert!(pool.rent(16).iter().all(|&byte| byte == 0xFF));
    }

    #[test]
    fn max_length_is_clamped() {
        let tiny: ArrayPool<u8> = ArrayPool::new(0, 1);
        assert_eq!(tiny.max_buffer_length(), MIN_BUFFER_LENGTH);
        let pool: ArrayPool<u8> = ArrayPool::new(100, 1);
        assert_eq!(pool.max_buffer_length(), 128);
    }

    #[test]
    #[should_panic(expected = "`ArrayPool::new()` - `max_buffers_per_bucket` is zero!")]
    fn zero_buffers_per_bucket_is_rejected() {
        let _: ArrayPool<u8> = ArrayPool::new(1024, 0);
    }

    #[test]
    fn shared_pool_is_a_singleton() {
        let first = std::ptr::from_ref(ArrayPool::shared());
        let second = std::ptr::from_ref(ArrayPool::shared());
        assert_eq!(first, second);
    }

    #[test]
    fn concurrent_rent_and_recycle() {
        let pool: ArrayPool<u64> = ArrayPool::new(4096, 8);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for length in [1usize, 16, 100, 1000, 5000] {
                        let buffer = pool.rent(length);
                        assert!(buffer.len() >= length);
                        pool.recycle(buffer, length % 2 == 0);
                    }
                });
            }
        });
    }
}
