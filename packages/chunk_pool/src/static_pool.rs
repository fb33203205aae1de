use std::cell::UnsafeCell;
use std::fmt;
use std::mem::MaybeUninit;
use std::num::NonZero;
use std::ptr::NonNull;
use std::sync::{Mutex, PoisonError};

use crate::{NoHooks, PoolError, PoolHooks, RawChunkPool};

/// A process-wide fixed-chunk pool backed by inline static storage.
///
/// This is the handle-free variant of [`ChunkPool`][crate::ChunkPool]: the
/// buffer is reserved inside the value itself and the pool is addressed as a
/// single explicitly-owned instance, typically a `static`, instead of being
/// threaded through call sites. `SIZE` is the storage size in bytes; chunk
/// size is chosen at [`init()`][Self::init] time.
///
/// All methods take `&'static self`: once the storage has been partitioned,
/// the value must never move, and requiring a `'static` receiver makes that
/// structurally impossible. Interior state lives behind a mutex, so the pool
/// is [`Sync`] and the zero-argument operations can be called from anywhere.
///
/// There is no teardown: a static pool, once initialized, stays initialized
/// for the life of the process.
///
/// # Example
///
/// ```rust
/// use chunk_pool::StaticPool;
///
/// static POOL: StaticPool<4096> = StaticPool::new();
///
/// POOL.init(64)?;
///
/// let payload = POOL.acquire().expect("fresh pool has free blocks");
///
/// // SAFETY: `payload` came from this pool and is not used afterwards.
/// unsafe {
///     POOL.release(payload.as_ptr());
/// }
/// # Ok::<(), chunk_pool::PoolError>(())
/// ```
pub struct StaticPool<const SIZE: usize, H: PoolHooks = NoHooks, const ALIGN: usize = 8> {
    /// The backing buffer. Only ever reached through the pool held in
    /// `state`, which serializes all access behind its mutex.
    storage: UnsafeCell<[MaybeUninit<u8>; SIZE]>,

    /// `None` until [`init()`][Self::init] succeeds; the transition is
    /// one-way.
    state: Mutex<Option<RawChunkPool<H, ALIGN>>>,
}

impl<const SIZE: usize, H: PoolHooks, const ALIGN: usize> StaticPool<SIZE, H, ALIGN> {
    /// Creates an uninitialized pool; usable as a `static` initializer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            storage: UnsafeCell::new([const { MaybeUninit::uninit() }; SIZE]),
            state: Mutex::new(None),
        }
    }

    /// Partitions the static storage into blocks of `chunk_size` payload
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::AlreadyInitialized`] if the pool was initialized
    /// before (re-partitioning over live allocations is refused), plus the
    /// usual layout failures: [`PoolError::ZeroChunkSize`] and
    /// [`PoolError::InsufficientCapacity`].
    pub fn init(&'static self, chunk_size: usize) -> Result<(), PoolError> {
        let mut state = self.lock_state();

        if state.is_some() {
            return Err(PoolError::AlreadyInitialized);
        }

        // SAFETY: the storage is 'static, and every path that touches it
        // goes through the mutex we are currently holding.
        let pool = unsafe { RawChunkPool::new(self.storage.get().cast::<u8>(), SIZE, chunk_size) }?;

        *state = Some(pool);
        Ok(())
    }

    /// Pops one block and returns its payload pointer.
    ///
    /// Returns `None` when the pool has not been initialized yet or is
    /// exhausted. The storage is static, so the pointer never dangles, but
    /// it must not be used after being released.
    #[must_use]
    pub fn acquire(&'static self) -> Option<NonNull<u8>> {
        self.lock_state().as_mut()?.acquire()
    }

    /// Returns an acquired block to the free list.
    ///
    /// A no-op when the pool has not been initialized. Null, misaligned, and
    /// out-of-range pointers are silently ignored, as for
    /// [`ChunkPool::release()`][crate::ChunkPool::release].
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer previously returned by
    /// [`acquire()`][Self::acquire] that has not been released since, and
    /// the caller must not access the payload afterwards.
    pub unsafe fn release(&'static self, ptr: *mut u8) {
        if let Some(pool) = self.lock_state().as_mut() {
            // SAFETY: forwarding the caller's guarantee.
            unsafe {
                pool.release(ptr);
            }
        }
    }

    /// Total number of blocks, or `None` before initialization.
    #[must_use]
    pub fn capacity(&'static self) -> Option<NonZero<usize>> {
        self.lock_state().as_ref().map(RawChunkPool::capacity)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, Option<RawChunkPool<H, ALIGN>>> {
        // A panic mid-operation cannot leave the pool structurally invalid:
        // operations either complete their list update or touch nothing, so
        // poisoning carries no information we need to honor.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<const SIZE: usize, H: PoolHooks, const ALIGN: usize> Default for StaticPool<SIZE, H, ALIGN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize, H: PoolHooks, const ALIGN: usize> fmt::Debug
    for StaticPool<SIZE, H, ALIGN>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticPool")
            .field("size", &SIZE)
            .field("initialized", &self.state.lock().map(|state| state.is_some()))
            .finish()
    }
}

// SAFETY: the storage cell is only ever dereferenced by the RawChunkPool
// behind the mutex, which serializes all header and free-list access.
// Payload memory handed out by acquire() is caller-managed by contract.
unsafe impl<const SIZE: usize, H: PoolHooks, const ALIGN: usize> Sync
    for StaticPool<SIZE, H, ALIGN>
{
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use super::*;

    #[test]
    fn acquire_before_init_is_none() {
        static POOL: StaticPool<256> = StaticPool::new();

        assert_eq!(POOL.acquire(), None);
        assert_eq!(POOL.capacity(), None);
    }

    #[test]
    fn release_before_init_is_a_no_op() {
        static POOL: StaticPool<256> = StaticPool::new();

        let mut byte = 0_u8;
        unsafe { POOL.release(&raw mut byte) };
        unsafe { POOL.release(std::ptr::null_mut()) };
    }

    #[test]
    fn init_once_then_serve() {
        static POOL: StaticPool<256> = StaticPool::new();

        POOL.init(3).unwrap();
        let capacity = POOL.capacity().unwrap().get();

        let mut acquired = Vec::new();
        while let Some(payload) = POOL.acquire() {
            assert_eq!(payload.addr().get() % 8, 0);
            acquired.push(payload);
        }

        assert_eq!(acquired.len(), capacity);
        assert_eq!(POOL.acquire(), None);

        for payload in acquired {
            unsafe { POOL.release(payload.as_ptr()) };
        }

        let refilled = std::iter::from_fn(|| POOL.acquire()).count();
        assert_eq!(refilled, capacity);
    }

    #[test]
    fn reinit_is_refused() {
        static POOL: StaticPool<256> = StaticPool::new();

        POOL.init(8).unwrap();
        assert_eq!(POOL.init(16), Err(PoolError::AlreadyInitialized));

        // The original partitioning is still live.
        assert!(POOL.capacity().is_some());
    }

    #[test]
    fn init_failures_leave_the_pool_uninitialized() {
        static POOL: StaticPool<64> = StaticPool::new();

        assert_eq!(POOL.init(0), Err(PoolError::ZeroChunkSize));
        assert_eq!(
            POOL.init(4096),
            Err(PoolError::InsufficientCapacity {
                size: 64,
                chunk_size: 4096
            })
        );

        assert_eq!(POOL.capacity(), None);

        // A later, valid init still works.
        POOL.init(4).unwrap();
        assert!(POOL.capacity().is_some());
    }

    #[test]
    fn shared_across_threads() {
        static POOL: StaticPool<1024> = StaticPool::new();

        POOL.init(16).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..100 {
                        if let Some(payload) = POOL.acquire() {
                            unsafe { POOL.release(payload.as_ptr()) };
                        }
                    }
                });
            }
        });

        // Every block came back: the pool drains to exactly its capacity.
        let capacity = POOL.capacity().unwrap().get();
        let drained = std::iter::from_fn(|| POOL.acquire()).count();
        assert_eq!(drained, capacity);
    }
}
