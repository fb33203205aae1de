use std::fmt;
use std::marker::PhantomData;
use std::num::NonZero;
use std::ptr::NonNull;

use crate::hooks::HookSection;
use crate::layout::{BlockHeader, FREE_LIST_END, PoolHeader, PoolLayout, align_down};
use crate::{NoHooks, PoolError, PoolHooks};

/// Value stamped into pool and block headers when the `guard` feature is on.
#[cfg(all(feature = "guard", target_pointer_width = "64"))]
pub(crate) const GUARD_MAGIC: usize = 0xDEAD_BEAF_DEAD_BEAF;

/// Value stamped into pool and block headers when the `guard` feature is on.
#[cfg(all(feature = "guard", target_pointer_width = "32"))]
pub(crate) const GUARD_MAGIC: usize = 0xDEAD_BEAF;

/// The pointer-based core of a fixed-chunk pool.
///
/// Partitions a raw buffer into equal-stride blocks at construction time and
/// afterwards serves [`acquire()`][Self::acquire] and
/// [`release()`][Self::release] in constant time from an intrusive LIFO free
/// list threaded through the Free blocks' headers. The free list is held as
/// byte offsets from the buffer base, never as raw pointers, so a stale or
/// foreign pointer can be rejected at the boundary before anything is
/// dereferenced through it.
///
/// This type does not own the buffer and never deallocates it; dropping the
/// pool leaves the buffer bytes exactly as they were. There is no teardown
/// operation.
///
/// Most callers want [`ChunkPool`][crate::ChunkPool], which binds this core
/// to a borrowed buffer and removes the pointer-validity obligations.
///
/// # Out of band access
///
/// The pool does not create or keep references to payload memory. Acquired
/// payloads are accessed entirely through the returned pointers, which remain
/// stable until released.
pub struct RawChunkPool<H: PoolHooks = NoHooks, const ALIGN: usize = 8> {
    /// Start of the caller-provided buffer. Not necessarily aligned; all
    /// layout offsets already account for the leading padding.
    base: NonNull<u8>,

    /// Precomputed block geometry for this buffer/chunk-size pairing.
    layout: PoolLayout,

    /// Requested payload size in bytes. Each block hands out exactly this
    /// many usable bytes (plus alignment slack up to the stride).
    chunk_size: usize,

    _hooks: PhantomData<H>,
}

impl<H: PoolHooks, const ALIGN: usize> RawChunkPool<H, ALIGN> {
    /// Overlays a pool on the `size` bytes at `base` and links every block
    /// into the free list.
    ///
    /// The buffer prefix is overwritten with header metadata; the usable
    /// region is a subset of `size` due to alignment padding and per-block
    /// header overhead.
    ///
    /// # Errors
    ///
    /// Fails without touching the buffer when `base` is null, `size` or
    /// `chunk_size` is zero, or the buffer cannot hold the pool header plus
    /// one whole aligned block.
    ///
    /// # Safety
    ///
    /// The caller must ensure that:
    ///
    /// - `base` points to a readable and writable region of at least `size`
    ///   bytes (or is null, which is reported as an error).
    /// - The region remains valid and is not accessed by anything other than
    ///   this pool and the payload pointers it hands out, for as long as the
    ///   pool is in use.
    pub unsafe fn new(base: *mut u8, size: usize, chunk_size: usize) -> Result<Self, PoolError> {
        const {
            assert!(ALIGN.is_power_of_two(), "ALIGN must be a power of two");
            assert!(
                ALIGN >= align_of::<usize>(),
                "ALIGN must not be narrower than the header word size"
            );
        }

        let Some(base) = NonNull::new(base) else {
            return Err(PoolError::NullBuffer);
        };

        if size == 0 {
            return Err(PoolError::ZeroSize);
        }

        if chunk_size == 0 {
            return Err(PoolError::ZeroChunkSize);
        }

        let layout = PoolLayout::calculate::<ALIGN>(base.addr().get(), size, chunk_size)
            .ok_or(PoolError::InsufficientCapacity { size, chunk_size })?;

        let pool = Self {
            base,
            layout,
            chunk_size,
            _hooks: PhantomData,
        };

        let header = PoolHeader {
            #[cfg(feature = "guard")]
            magic: GUARD_MAGIC,
            free_head: pool.layout.first_block_offset,
        };

        // SAFETY: header_offset is in-bounds (the layout proved header plus
        // one block fit in `size`) and ALIGN-aligned, and the caller vouches
        // for the buffer being writable.
        unsafe {
            pool.header_ptr().write(header);
        }

        // Link the blocks in address order, terminating the last one.
        for index in 0..pool.layout.capacity.get() {
            // Cannot overflow: every block was proven to fit in the buffer.
            let offset = pool
                .layout
                .first_block_offset
                .wrapping_add(index.wrapping_mul(pool.layout.stride));

            let next_free = if index.wrapping_add(1) == pool.layout.capacity.get() {
                FREE_LIST_END
            } else {
                // Cannot overflow: the successor block is in-bounds too.
                offset.wrapping_add(pool.layout.stride)
            };

            let block = BlockHeader {
                #[cfg(feature = "guard")]
                magic: GUARD_MAGIC,
                next_free,
            };

            // SAFETY: `offset` names a block start inside the buffer, which
            // is ALIGN-aligned because the first block is and the stride is a
            // multiple of ALIGN.
            unsafe {
                pool.block_ptr(offset).write(block);
            }
        }

        Ok(pool)
    }

    /// Pops one block from the free list and returns its payload pointer.
    ///
    /// Returns `None` when the pool is exhausted, which is the normal empty
    /// result rather than an error. With the `guard` feature it also returns
    /// `None` when header corruption is detected, in which case
    /// [`PoolHooks::on_corruption`] has been invoked and no pool state was
    /// mutated.
    ///
    /// The returned pointer is `ALIGN`-aligned, points to `chunk_size`
    /// usable bytes of uninitialized memory, and stays valid until passed
    /// back to [`release()`][Self::release]. Constant time.
    #[must_use]
    pub fn acquire(&mut self) -> Option<NonNull<u8>> {
        let _section = HookSection::<H>::enter();
        self.acquire_locked()
    }

    #[expect(clippy::needless_pass_by_ref_mut, reason = "false positive")]
    fn acquire_locked(&mut self) -> Option<NonNull<u8>> {
        #[cfg(feature = "guard")]
        {
            // SAFETY: the pool header was initialized in new() and stays
            // in-bounds and aligned for the life of the pool.
            let pool_magic = unsafe { self.header_ptr().as_ref() }.magic;
            if pool_magic != GUARD_MAGIC {
                H::on_corruption(self.header_ptr().cast::<u8>().as_ptr());
                return None;
            }
        }

        // SAFETY: the pool header was initialized in new() and stays
        // in-bounds and aligned for the life of the pool.
        let head = unsafe { self.header_ptr().as_ref() }.free_head;
        if head == FREE_LIST_END {
            // Pool exhausted.
            return None;
        }

        let block = self.block_ptr(head);

        #[cfg(feature = "guard")]
        {
            // Verify the block before trusting its link, and before any
            // state changes, so a failed check leaves the pool untouched.
            // SAFETY: `head` came from the free list, whose offsets only
            // ever name block starts inside the buffer.
            let block_magic = unsafe { block.as_ref() }.magic;
            if block_magic != GUARD_MAGIC {
                H::on_corruption(block.cast::<u8>().as_ptr());
                return None;
            }
        }

        // SAFETY: `head` names an initialized, in-bounds block header.
        let next = unsafe { block.as_ref() }.next_free;

        let mut header = self.header_ptr();
        // SAFETY: exclusive access through &mut self; the header pointer is
        // valid and aligned.
        unsafe { header.as_mut() }.free_head = next;

        Some(self.payload_ptr(head))
    }

    /// Returns an acquired block to the free list.
    ///
    /// A null pointer is a no-op. A pointer that fails the membership check
    /// (misaligned, below the first block, past the last block, or not on a
    /// stride boundary) is silently ignored rather than linked in, so a bad
    /// release cannot corrupt later allocations. With the `guard` feature, a
    /// header magic mismatch invokes [`PoolHooks::on_corruption`] once and
    /// aborts without mutating the list.
    ///
    /// The released block becomes the new free-list head, so the most
    /// recently released block is the next one acquired (LIFO). Constant
    /// time.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer previously returned by
    /// [`acquire()`][Self::acquire] on this pool that has not been released
    /// since, and the caller must not access the payload after this call.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        let _section = HookSection::<H>::enter();

        if ptr.is_null() {
            return;
        }

        let Some(block_offset) = self.block_offset_of(ptr.addr()) else {
            // Out-of-range or misaligned pointer; refuse to link it in.
            return;
        };

        #[cfg(feature = "guard")]
        if !self.release_guard_ok(block_offset) {
            H::on_corruption(ptr.cast_const());
            return;
        }

        // SAFETY: the pool header is initialized, in-bounds, and aligned.
        let head = unsafe { self.header_ptr().as_ref() }.free_head;

        let mut block = self.block_ptr(block_offset);
        // SAFETY: membership validation proved block_offset names a block
        // start inside the buffer; exclusive access through &mut self.
        unsafe { block.as_mut() }.next_free = head;

        let mut header = self.header_ptr();
        // SAFETY: exclusive access through &mut self; the header pointer is
        // valid and aligned.
        unsafe { header.as_mut() }.free_head = block_offset;
    }

    /// Total number of blocks this pool was laid out with.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Trivial forwarding, mutation proves nothing.
    pub fn capacity(&self) -> NonZero<usize> {
        self.layout.capacity
    }

    /// Usable payload bytes per block, as requested at construction.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Trivial forwarding, mutation proves nothing.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Byte distance between consecutive block start addresses.
    #[must_use]
    pub fn stride(&self) -> usize {
        self.layout.stride
    }

    fn header_ptr(&self) -> NonNull<PoolHeader> {
        // SAFETY: header_offset is inside the buffer per the layout
        // calculation performed in new().
        unsafe { self.base.add(self.layout.header_offset) }.cast::<PoolHeader>()
    }

    fn block_ptr(&self, offset: usize) -> NonNull<BlockHeader> {
        debug_assert!(offset >= self.layout.first_block_offset);
        debug_assert!(offset < self.layout.blocks_end_offset());

        // SAFETY: block offsets are confined to the buffer; asserted above.
        unsafe { self.base.add(offset) }.cast::<BlockHeader>()
    }

    fn payload_ptr(&self, block_offset: usize) -> NonNull<u8> {
        // Cannot overflow: the payload lies within the block's stride.
        let offset = block_offset.wrapping_add(self.layout.payload_offset);

        // SAFETY: the payload stays inside the block, which is inside the
        // buffer.
        unsafe { self.base.add(offset) }
    }

    /// Maps a payload address to its block's offset, or `None` when the
    /// address does not name a payload this pool handed out.
    ///
    /// This is the full membership predicate: alignment, lower bound, upper
    /// bound, and stride-boundary placement. Anything weaker would let a
    /// misaligned or out-of-range pointer be linked into the free list.
    fn block_offset_of(&self, addr: usize) -> Option<usize> {
        if align_down(addr, ALIGN) != addr {
            return None;
        }

        let block_addr = addr.checked_sub(self.layout.payload_offset)?;
        let block_offset = block_addr.checked_sub(self.base.addr().get())?;

        let relative = block_offset.checked_sub(self.layout.first_block_offset)?;
        if block_offset >= self.layout.blocks_end_offset() {
            return None;
        }

        if relative.checked_rem(self.layout.stride) != Some(0) {
            return None;
        }

        Some(block_offset)
    }

    /// Verifies the pool header, the released block, and (when the list is
    /// non-empty) the current head. Returns `false` on the first mismatch so
    /// the caller reports the corruption exactly once.
    #[cfg(feature = "guard")]
    fn release_guard_ok(&self, block_offset: usize) -> bool {
        // SAFETY: the pool header is initialized, in-bounds, and aligned.
        if unsafe { self.header_ptr().as_ref() }.magic != GUARD_MAGIC {
            return false;
        }

        // SAFETY: block_offset passed the membership predicate.
        if unsafe { self.block_ptr(block_offset).as_ref() }.magic != GUARD_MAGIC {
            return false;
        }

        // SAFETY: the pool header is initialized, in-bounds, and aligned.
        let head = unsafe { self.header_ptr().as_ref() }.free_head;
        if head != FREE_LIST_END {
            // SAFETY: free-list offsets only ever name block starts.
            if unsafe { self.block_ptr(head).as_ref() }.magic != GUARD_MAGIC {
                return false;
            }
        }

        true
    }
}

impl<H: PoolHooks, const ALIGN: usize> fmt::Debug for RawChunkPool<H, ALIGN> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawChunkPool")
            .field("base", &self.base)
            .field("chunk_size", &self.chunk_size)
            .field("layout", &self.layout)
            .finish()
    }
}

// SAFETY: The pool holds raw pointers purely for bookkeeping within the one
// buffer it was given; it has no thread affinity and no shared state. All
// mutation goes through &mut self, so moving the pool to another thread is
// sound. It is deliberately not Sync: concurrent calls must be serialized by
// the caller, e.g. via the lock hooks.
unsafe impl<H: PoolHooks, const ALIGN: usize> Send for RawChunkPool<H, ALIGN> {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::mem::MaybeUninit;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// An alignment-pinned test buffer so block counts are deterministic.
    #[repr(align(64))]
    struct Buffer<const N: usize>([MaybeUninit<u8>; N]);

    impl<const N: usize> Buffer<N> {
        fn new() -> Self {
            Self([MaybeUninit::uninit(); N])
        }

        fn base(&mut self) -> *mut u8 {
            self.0.as_mut_ptr().cast::<u8>()
        }
    }

    #[test]
    fn rejects_null_buffer() {
        let result = unsafe { RawChunkPool::<NoHooks>::new(std::ptr::null_mut(), 256, 3) };
        assert_eq!(result.unwrap_err(), PoolError::NullBuffer);
    }

    #[test]
    fn rejects_zero_size() {
        let mut buffer = Buffer::<256>::new();
        let result = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 0, 3) };
        assert_eq!(result.unwrap_err(), PoolError::ZeroSize);
    }

    #[test]
    fn rejects_zero_chunk_size() {
        let mut buffer = Buffer::<256>::new();
        let result = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 256, 0) };
        assert_eq!(result.unwrap_err(), PoolError::ZeroChunkSize);
    }

    #[test]
    fn rejects_chunk_larger_than_buffer() {
        let mut buffer = Buffer::<256>::new();
        let result = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 3, 256) };
        assert_eq!(
            result.unwrap_err(),
            PoolError::InsufficientCapacity {
                size: 3,
                chunk_size: 256
            }
        );
    }

    #[test]
    fn acquires_are_aligned_and_distinct() {
        let mut buffer = Buffer::<256>::new();
        let mut pool = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 256, 3) }.unwrap();

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();

        assert_eq!(first.addr().get() % 8, 0);
        assert_eq!(second.addr().get() % 8, 0);
        assert_ne!(first, second);

        // Payloads must not overlap: at least a stride apart.
        let distance = first.addr().get().abs_diff(second.addr().get());
        assert!(distance >= pool.stride());
    }

    #[test]
    fn release_then_acquire_is_lifo() {
        let mut buffer = Buffer::<256>::new();
        let mut pool = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 256, 3) }.unwrap();

        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();

        unsafe { pool.release(second.as_ptr()) };
        assert_eq!(pool.acquire(), Some(second));

        unsafe { pool.release(first.as_ptr()) };
        unsafe { pool.release(second.as_ptr()) };
        assert_eq!(pool.acquire(), Some(second));
        assert_eq!(pool.acquire(), Some(first));
    }

    #[test]
    fn exhaustion_returns_none_then_recovers() {
        let mut buffer = Buffer::<256>::new();
        let mut pool = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 256, 3) }.unwrap();

        let mut acquired = Vec::new();
        while let Some(payload) = pool.acquire() {
            acquired.push(payload);
        }

        assert_eq!(acquired.len(), pool.capacity().get());
        assert_eq!(pool.acquire(), None);

        // Exhaustion must not have corrupted anything: drain and refill.
        for payload in acquired.drain(..) {
            unsafe { pool.release(payload.as_ptr()) };
        }

        let refilled = std::iter::from_fn(|| pool.acquire()).count();
        assert_eq!(refilled, pool.capacity().get());
    }

    #[cfg(all(target_pointer_width = "64", not(feature = "guard")))]
    #[test]
    fn canonical_scenario_capacity() {
        use new_zealand::nz;

        // 256-byte buffer, 3-byte chunks, 8-byte alignment, aligned base:
        // stride 16, first block at offset 8 -> 15 blocks.
        let mut buffer = Buffer::<256>::new();
        let pool = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 256, 3) }.unwrap();

        assert_eq!(pool.capacity(), nz!(15));
    }

    #[test]
    fn release_null_is_a_no_op() {
        let mut buffer = Buffer::<256>::new();
        let mut pool = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 256, 3) }.unwrap();

        let head_before = pool.acquire().unwrap();
        unsafe { pool.release(head_before.as_ptr()) };

        unsafe { pool.release(std::ptr::null_mut()) };

        // The head is unchanged: the same block comes back.
        assert_eq!(pool.acquire(), Some(head_before));
    }

    #[test]
    fn release_rejects_foreign_and_misaligned_pointers() {
        let mut buffer = Buffer::<256>::new();
        let mut outside = Buffer::<64>::new();
        let mut pool = unsafe { RawChunkPool::<NoHooks>::new(buffer.base(), 256, 3) }.unwrap();

        let payload = pool.acquire().unwrap();

        // Below the first block.
        unsafe { pool.release(buffer.base()) };
        // Entirely outside the buffer.
        unsafe { pool.release(outside.base()) };
        // Past the end of the last block.
        unsafe { pool.release(buffer.base().wrapping_add(1024)) };
        // Inside the pool but not on a payload boundary.
        unsafe { pool.release(payload.as_ptr().wrapping_add(1)) };
        unsafe { pool.release(payload.as_ptr().wrapping_add(8)) };

        // None of those may have entered the free list: after draining the
        // remaining blocks the pool must be empty, not handing out garbage.
        let remaining = std::iter::from_fn(|| pool.acquire()).count();
        assert_eq!(remaining, pool.capacity().get() - 1);
        assert_eq!(pool.acquire(), None);
    }

    #[test]
    fn lock_hooks_pair_on_every_path() {
        static LOCKS: AtomicUsize = AtomicUsize::new(0);
        static UNLOCKS: AtomicUsize = AtomicUsize::new(0);

        struct CountingHooks;

        impl PoolHooks for CountingHooks {
            fn lock() {
                LOCKS.fetch_add(1, Ordering::SeqCst);
            }

            fn unlock() {
                UNLOCKS.fetch_add(1, Ordering::SeqCst);
            }
        }

        let mut buffer = Buffer::<64>::new();
        let mut pool =
            unsafe { RawChunkPool::<CountingHooks>::new(buffer.base(), 64, 8) }.unwrap();

        let mut operations = 0_usize;

        // Successful acquires, then the exhausted early return.
        let mut acquired = Vec::new();
        while let Some(payload) = pool.acquire() {
            operations += 1;
            acquired.push(payload);
        }
        operations += 1; // The None that ended the loop.

        // Early-return releases: null and out-of-range.
        unsafe { pool.release(std::ptr::null_mut()) };
        operations += 1;
        unsafe { pool.release(buffer.base().wrapping_add(2048)) };
        operations += 1;

        // Successful releases.
        for payload in acquired {
            unsafe { pool.release(payload.as_ptr()) };
            operations += 1;
        }

        assert_eq!(LOCKS.load(Ordering::SeqCst), operations);
        assert_eq!(UNLOCKS.load(Ordering::SeqCst), operations);
    }

    #[cfg(feature = "guard")]
    mod guard {
        use super::*;

        /// Hooks that count corruption reports and remember the last address.
        macro_rules! corruption_counter {
            ($name:ident, $counter:ident) => {
                static $counter: AtomicUsize = AtomicUsize::new(0);

                struct $name;

                impl PoolHooks for $name {
                    fn on_corruption(addr: *const u8) {
                        assert!(!addr.is_null());
                        $counter.fetch_add(1, Ordering::SeqCst);
                    }
                }
            };
        }

        #[test]
        fn overrun_into_next_block_is_reported_once_on_acquire() {
            corruption_counter!(Hooks, REPORTS);

            let mut buffer = Buffer::<256>::new();
            let mut pool = unsafe { RawChunkPool::<Hooks>::new(buffer.base(), 256, 3) }.unwrap();
            assert!(pool.capacity().get() >= 2);

            let payload = pool.acquire().unwrap();
            assert_eq!(REPORTS.load(Ordering::SeqCst), 0);

            // Simulated buffer overrun: writing one full stride from the
            // payload start clobbers the next block's header.
            unsafe {
                payload.write_bytes(0, pool.stride());
            }

            // The next acquire pops the clobbered block and must report it.
            assert_eq!(pool.acquire(), None);
            assert_eq!(REPORTS.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn corrupted_pool_header_is_reported_on_acquire() {
            corruption_counter!(Hooks, REPORTS);

            let mut buffer = Buffer::<256>::new();
            let mut pool = unsafe { RawChunkPool::<Hooks>::new(buffer.base(), 256, 3) }.unwrap();

            // Underrun: smash the pool header at the front of the buffer.
            unsafe {
                buffer.base().write_bytes(0xAA, 8);
            }

            assert_eq!(pool.acquire(), None);
            assert_eq!(REPORTS.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn corrupted_pool_header_is_reported_on_release() {
            corruption_counter!(Hooks, REPORTS);

            let mut buffer = Buffer::<256>::new();
            let mut pool = unsafe { RawChunkPool::<Hooks>::new(buffer.base(), 256, 3) }.unwrap();

            let payload = pool.acquire().unwrap();

            unsafe {
                buffer.base().write_bytes(0xAA, 8);
            }

            unsafe { pool.release(payload.as_ptr()) };
            assert_eq!(REPORTS.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn corrupted_released_block_header_is_reported() {
            corruption_counter!(Hooks, REPORTS);

            let mut buffer = Buffer::<256>::new();
            let mut pool = unsafe { RawChunkPool::<Hooks>::new(buffer.base(), 256, 3) }.unwrap();

            let payload = pool.acquire().unwrap();

            // Payload underrun: smash the acquired block's own header. Its
            // canary must survive the allocation for release to trust it,
            // and the header precedes the payload by exactly its own size
            // with the default alignment.
            unsafe {
                payload
                    .as_ptr()
                    .wrapping_sub(size_of::<BlockHeader>())
                    .write_bytes(0xAA, size_of::<BlockHeader>());
            }

            unsafe { pool.release(payload.as_ptr()) };
            assert_eq!(REPORTS.load(Ordering::SeqCst), 1);

            // The failed release must not have linked the block back in:
            // the drain yields every block except the corrupted one.
            let remaining = std::iter::from_fn(|| pool.acquire()).count();
            assert_eq!(remaining, pool.capacity().get() - 1);
            assert_eq!(REPORTS.load(Ordering::SeqCst), 1);
        }

        #[test]
        fn corrupted_free_head_is_reported_on_release() {
            corruption_counter!(Hooks, REPORTS);

            let mut buffer = Buffer::<256>::new();
            let mut pool = unsafe { RawChunkPool::<Hooks>::new(buffer.base(), 256, 3) }.unwrap();
            assert!(pool.capacity().get() >= 3);

            let first = pool.acquire().unwrap();
            let _second = pool.acquire().unwrap();

            // Blocks are linked in address order, so the current head sits
            // two strides past the first block. Smash its header.
            let first_block = first.as_ptr().wrapping_sub(size_of::<BlockHeader>());
            unsafe {
                first_block
                    .wrapping_add(2 * pool.stride())
                    .write_bytes(0xAA, size_of::<BlockHeader>());
            }

            // The released block itself is intact; the check that fails is
            // the one on the current head, before any pointer is rewritten.
            unsafe { pool.release(first.as_ptr()) };
            assert_eq!(REPORTS.load(Ordering::SeqCst), 1);

            // Had the release gone through, `first` would be the next block
            // out. The head still being the corrupted block proves the
            // failed release moved nothing.
            assert_eq!(pool.acquire(), None);
            assert_eq!(REPORTS.load(Ordering::SeqCst), 2);
        }

        #[test]
        fn clean_traffic_never_reports() {
            corruption_counter!(Hooks, REPORTS);

            let mut buffer = Buffer::<256>::new();
            let mut pool = unsafe { RawChunkPool::<Hooks>::new(buffer.base(), 256, 3) }.unwrap();

            let mut acquired = Vec::new();
            while let Some(payload) = pool.acquire() {
                // Filling the payload itself is legitimate use and must not
                // trip the canary of any neighbouring header.
                unsafe {
                    payload.write_bytes(0xFF, pool.chunk_size());
                }
                acquired.push(payload);
            }

            for payload in acquired {
                unsafe { pool.release(payload.as_ptr()) };
            }

            assert_eq!(REPORTS.load(Ordering::SeqCst), 0);
        }
    }
}
