use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::num::NonZero;
use std::ptr::NonNull;

use crate::{NoHooks, PoolError, PoolHooks, RawChunkPool};

/// A deterministic fixed-chunk block pool over a caller-provided buffer.
///
/// The buffer is partitioned once, at construction, into equal-stride blocks
/// of `chunk_size` payload bytes each; afterwards [`acquire()`][Self::acquire]
/// and [`release()`][Self::release] run in constant time off an intrusive
/// LIFO free list. There is no heap involvement at any point: the pool is
/// built for environments where a general-purpose allocator is unavailable
/// or unwanted.
///
/// The pool borrows the buffer exclusively for its own lifetime and never
/// frees, grows, or shrinks it. Variable-size allocation, coalescing, and
/// defragmentation are explicitly out of scope.
///
/// # Type parameters
///
/// - `H`: [`PoolHooks`] supplying lock/unlock bracketing and the corruption
///   callback. Defaults to [`NoHooks`], which compiles to nothing.
/// - `ALIGN`: machine alignment in bytes (default 8). Every payload pointer
///   the pool returns is aligned to this boundary. Must be a power of two no
///   narrower than `usize`.
///
/// # Example
///
/// ```rust
/// use std::mem::MaybeUninit;
///
/// use chunk_pool::ChunkPool;
///
/// let mut buffer = [MaybeUninit::<u8>::uninit(); 256];
/// let mut pool: ChunkPool<'_> = ChunkPool::new(&mut buffer, 24)?;
///
/// let payload = pool.acquire().expect("fresh pool has free blocks");
///
/// // The payload is caller-owned until released.
/// // SAFETY: the pointer is valid for chunk_size() bytes until released.
/// unsafe {
///     payload.write_bytes(0x2A, pool.chunk_size());
/// }
///
/// // SAFETY: `payload` came from this pool and is not used again.
/// unsafe {
///     pool.release(payload.as_ptr());
/// }
/// # Ok::<(), chunk_pool::PoolError>(())
/// ```
///
/// # Thread safety
///
/// The pool is thread-mobile ([`Send`]) but not [`Sync`]. For cross-thread
/// use, serialize calls externally (that is exactly what the lock hooks are
/// for) or wrap the pool in a mutex.
#[derive(Debug)]
pub struct ChunkPool<'buf, H: PoolHooks = NoHooks, const ALIGN: usize = 8> {
    raw: RawChunkPool<H, ALIGN>,

    /// The exclusive borrow keeping the buffer alive and untouchable by
    /// anyone else while the pool exists.
    _buffer: PhantomData<&'buf mut [MaybeUninit<u8>]>,
}

impl<'buf, H: PoolHooks, const ALIGN: usize> ChunkPool<'buf, H, ALIGN> {
    /// Overlays a pool on `buffer`, partitioning it into blocks of
    /// `chunk_size` payload bytes.
    ///
    /// The buffer's prefix is overwritten with pool metadata; alignment
    /// padding and per-block header overhead mean the usable capacity is
    /// somewhat below `buffer.len() / chunk_size`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ZeroSize`] for an empty buffer,
    /// [`PoolError::ZeroChunkSize`] for a zero chunk size, and
    /// [`PoolError::InsufficientCapacity`] when the buffer cannot hold the
    /// pool header plus one whole aligned block.
    pub fn new(
        buffer: &'buf mut [MaybeUninit<u8>],
        chunk_size: usize,
    ) -> Result<Self, PoolError> {
        let base = buffer.as_mut_ptr().cast::<u8>();

        // SAFETY: the exclusive borrow guarantees the region is valid,
        // writable, and reserved for this pool for all of 'buf.
        let raw = unsafe { RawChunkPool::new(base, buffer.len(), chunk_size) }?;

        Ok(Self {
            raw,
            _buffer: PhantomData,
        })
    }

    /// Pops one block from the free list and returns its payload pointer.
    ///
    /// Returns `None` when the pool is exhausted; that is the normal empty
    /// result, not an error. With the `guard` feature, header corruption also
    /// yields `None` after reporting through [`PoolHooks::on_corruption`].
    ///
    /// The pointer is `ALIGN`-aligned, refers to [`chunk_size()`][1] bytes of
    /// uninitialized payload, and remains valid until released or until the
    /// pool (and with it the buffer borrow) is dropped.
    ///
    /// [1]: Self::chunk_size
    #[must_use]
    pub fn acquire(&mut self) -> Option<NonNull<u8>> {
        self.raw.acquire()
    }

    /// Returns an acquired block to the free list (LIFO: it becomes the next
    /// block [`acquire()`][Self::acquire] hands out).
    ///
    /// Null, misaligned, and out-of-range pointers are silently ignored; the
    /// membership check prevents a bad release from corrupting the free
    /// list. With the `guard` feature, header corruption is reported through
    /// [`PoolHooks::on_corruption`] and the list is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer previously returned by
    /// [`acquire()`][Self::acquire] on this pool that has not been released
    /// since, and the caller must not access the payload afterwards.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        // SAFETY: forwarding the caller's guarantee.
        unsafe {
            self.raw.release(ptr);
        }
    }

    /// Total number of blocks this pool was laid out with.
    #[must_use]
    pub fn capacity(&self) -> NonZero<usize> {
        self.raw.capacity()
    }

    /// Usable payload bytes per block.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.raw.chunk_size()
    }

    /// Byte distance between consecutive block start addresses:
    /// `align_up(align_up(header size) + chunk_size)`.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.raw.stride()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn rejects_empty_buffer() {
        let mut buffer: [MaybeUninit<u8>; 0] = [];
        let result = ChunkPool::<NoHooks>::new(&mut buffer, 3);
        assert_eq!(result.unwrap_err(), PoolError::ZeroSize);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let mut buffer = [MaybeUninit::<u8>::uninit(); 256];
        let result = ChunkPool::<NoHooks>::new(&mut buffer, 0);
        assert_eq!(result.unwrap_err(), PoolError::ZeroChunkSize);
    }

    #[test]
    fn rejects_oversized_chunk() {
        let mut buffer = [MaybeUninit::<u8>::uninit(); 64];
        let result = ChunkPool::<NoHooks>::new(&mut buffer, 4096);
        assert!(matches!(
            result.unwrap_err(),
            PoolError::InsufficientCapacity { .. }
        ));
    }

    #[test]
    fn every_acquired_pointer_is_aligned() {
        // Sweep chunk sizes that straddle alignment boundaries; every payload
        // the pool ever returns must land on the machine alignment.
        for chunk_size in 1..48_usize {
            let mut buffer = [MaybeUninit::<u8>::uninit(); 1024];
            let mut pool = ChunkPool::<NoHooks>::new(&mut buffer, chunk_size).unwrap();

            while let Some(payload) = pool.acquire() {
                assert_eq!(
                    payload.addr().get() % 8,
                    0,
                    "misaligned payload for chunk size {chunk_size}"
                );
            }
        }
    }

    #[test]
    fn payloads_do_not_overlap() {
        let mut buffer = [MaybeUninit::<u8>::uninit(); 512];
        let mut pool = ChunkPool::<NoHooks>::new(&mut buffer, 16).unwrap();
        let stride = pool.stride();

        let mut starts = Vec::new();
        while let Some(payload) = pool.acquire() {
            starts.push(payload.addr().get());
        }

        starts.sort_unstable();
        for pair in starts.windows(2) {
            assert!(pair[1] - pair[0] >= stride);
        }
    }

    #[test]
    fn release_then_acquire_returns_the_same_pointer() {
        let mut buffer = [MaybeUninit::<u8>::uninit(); 256];
        let mut pool = ChunkPool::<NoHooks>::new(&mut buffer, 8).unwrap();

        let first = pool.acquire().unwrap();
        let _second = pool.acquire().unwrap();

        unsafe { pool.release(first.as_ptr()) };
        assert_eq!(pool.acquire(), Some(first));
    }

    #[test]
    fn canonical_scenario_drain_refill() {
        // 256-byte buffer, chunk size 3, alignment 8.
        // Whatever capacity the stride formula yields, the pool must hand out
        // exactly that many blocks, refuse the next, and repeat the same
        // count after a full drain.
        let mut buffer = [MaybeUninit::<u8>::uninit(); 256];
        let mut pool = ChunkPool::<NoHooks>::new(&mut buffer, 3).unwrap();
        let expected = pool.capacity().get();

        let mut acquired = Vec::new();
        while let Some(payload) = pool.acquire() {
            acquired.push(payload);
        }
        assert_eq!(acquired.len(), expected);
        assert_eq!(pool.acquire(), None);

        let unique: HashSet<_> = acquired.iter().copied().collect();
        assert_eq!(unique.len(), expected);

        for payload in acquired.drain(..) {
            unsafe { pool.release(payload.as_ptr()) };
        }

        let second_round = std::iter::from_fn(|| pool.acquire()).count();
        assert_eq!(second_round, expected);
    }

    #[test]
    fn payload_survives_until_release() {
        let mut buffer = [MaybeUninit::<u8>::uninit(); 256];
        let mut pool = ChunkPool::<NoHooks>::new(&mut buffer, 4).unwrap();

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();

        unsafe {
            first.cast::<u32>().write(0xDEAD_0001);
            second.cast::<u32>().write(0xDEAD_0002);
        }

        // Pool traffic elsewhere must not disturb allocated payloads.
        let third = pool.acquire().unwrap();
        unsafe { pool.release(third.as_ptr()) };

        unsafe {
            assert_eq!(first.cast::<u32>().read(), 0xDEAD_0001);
            assert_eq!(second.cast::<u32>().read(), 0xDEAD_0002);
        }
    }

    #[test]
    fn lock_hooks_fire_exactly_once_per_operation() {
        static LOCKS: AtomicUsize = AtomicUsize::new(0);
        static UNLOCKS: AtomicUsize = AtomicUsize::new(0);

        struct CountingHooks;

        impl PoolHooks for CountingHooks {
            fn lock() {
                LOCKS.fetch_add(1, Ordering::SeqCst);
            }

            fn unlock() {
                // The lock must already be held when unlock runs.
                assert!(UNLOCKS.load(Ordering::SeqCst) < LOCKS.load(Ordering::SeqCst));
                UNLOCKS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut buffer = [MaybeUninit::<u8>::uninit(); 128];
        let mut pool = ChunkPool::<CountingHooks>::new(&mut buffer, 16).unwrap();

        let payload = pool.acquire().unwrap();
        unsafe { pool.release(payload.as_ptr()) };
        unsafe { pool.release(std::ptr::null_mut()) };

        assert_eq!(LOCKS.load(Ordering::SeqCst), 3);
        assert_eq!(UNLOCKS.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn pool_is_send() {
        static_assertions::assert_impl_all!(ChunkPool<'static>: Send);
    }

    #[test]
    fn pool_moves_between_threads() {
        // Thread-mobile: a pool (and its borrowed buffer) can migrate.
        let mut buffer = vec![MaybeUninit::<u8>::uninit(); 256];

        std::thread::scope(|scope| {
            let mut pool = ChunkPool::<NoHooks>::new(buffer.as_mut_slice(), 8).unwrap();

            scope
                .spawn(move || {
                    let payload = pool.acquire().unwrap();
                    unsafe { pool.release(payload.as_ptr()) };
                })
                .join()
                .unwrap();
        });
    }
}
