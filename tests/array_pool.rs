use proptest::prelude::*;
use rootstock::ArrayPool;

// ─── Randomized rent/recycle traffic ─────────────────────────────────────────

proptest! {
    /// Random rent/recycle traffic: every rented buffer covers the request,
    /// in-range buffers are class-sized and oversize ones are exact.
    #[test]
    fn rented_buffers_cover_requests(lengths in proptest::collection::vec(0usize..10_000, 1..256)) {
        let pool: ArrayPool<u32> = ArrayPool::new(4096, 8);

        let mut held = Vec::new();
        for (i, &length) in lengths.iter().enumerate() {
            let buffer = pool.rent(length);
            prop_assert!(buffer.len() >= length, "rent({}) returned {} elements", length, buffer.len());
            if length == 0 {
                prop_assert_eq!(buffer.len(), 0);
            } else if length > pool.max_buffer_length() {
                prop_assert_eq!(buffer.len(), length, "oversize rents are exact");
            } else {
                prop_assert!(buffer.len().is_power_of_two() && buffer.len() >= 16, "pooled rents are class-sized");
            }
            // Hold on to every other buffer so rents interleave with
            // returns instead of ping-ponging a single slot.
            if i % 2 == 0 {
                held.push(buffer);
            } else {
                pool.recycle(buffer, false);
            }
        }
        for buffer in held {
            pool.recycle(buffer, false);
        }
    }

    /// Recycling with `clear` always hands the next renter zeroed memory.
    #[test]
    fn cleared_buffers_come_back_zeroed(lengths in proptest::collection::vec(1usize..2048, 1..64)) {
        let pool: ArrayPool<u8> = ArrayPool::new(4096, 8);

        for &length in &lengths {
            let mut buffer = pool.rent(length);
            buffer.fill(0xEE);
            pool.recycle(buffer, true);

            let buffer = pool.rent(length);
            prop_assert!(buffer.iter().all(|&byte| byte == 0), "rent({}) saw dirty bytes", length);
            pool.recycle(buffer, true);
        }
    }
}

// ─── Cross-thread behavior ───────────────────────────────────────────────────

#[test]
fn shared_pool_recycles_across_threads() {
    // A buffer recycled on one thread is rentable from another.
    let buffer = ArrayPool::shared().rent(1024);
    let address = buffer.as_ptr() as usize;
    ArrayPool::shared().recycle(buffer, false);

    let handle = std::thread::spawn(move || {
        let buffer = ArrayPool::shared().rent(1024);
        let reused = buffer.as_ptr() as usize == address;
        ArrayPool::shared().recycle(buffer, false);
        reused
    });
    // Not asserted: another test may race us to the shared pool. The point
    // is that the cross-thread rent itself is sound.
    let _ = handle.join().expect("renter thread panicked");
}

#[test]
fn hammering_one_bucket_from_many_threads() {
    let pool: ArrayPool<u64> = ArrayPool::new(1024, 4);
    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for round in 0..1_000 {
                    let mut buffer = pool.rent(64);
                    assert_eq!(buffer.len(), 64);
                    buffer.fill(round);
                    pool.recycle(buffer, round % 2 == 0);
                }
            });
        }
    });
}
