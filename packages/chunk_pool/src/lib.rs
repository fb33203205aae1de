//! A deterministic, fixed-chunk block allocator over caller-provided memory.
//!
//! This crate provides [`ChunkPool`], which partitions a single contiguous
//! buffer into equal-size chunks at construction time and then serves
//! acquire/release requests in constant time from an intrusive LIFO free
//! list. It is built for resource-constrained and real-time environments
//! where a general-purpose heap is unavailable or undesirable: after
//! construction there is no heap traffic, no amortized growth, and no
//! operation whose cost depends on pool occupancy.
//!
//! # Key features
//!
//! - **Caller-owned memory**: the pool overlays a buffer you provide (a
//!   stack array, a `static`, or any writable region) and never frees,
//!   grows, or shrinks it
//! - **O(1) acquire and release**: a pop or push on the free list, nothing
//!   else; initialization is a single O(capacity) walk
//! - **Aligned payloads**: every pointer handed out is aligned to the
//!   machine alignment (`ALIGN` const parameter, default 8 bytes)
//! - **Membership-checked release**: misaligned, foreign, and out-of-range
//!   pointers are rejected at the arena boundary instead of corrupting the
//!   free list
//! - **Optional corruption detection** (`guard` feature): header canaries
//!   verified on every operation, with mismatches routed to a callback
//! - **Pluggable locking** ([`PoolHooks`]): lock/unlock bracketing for use
//!   under interrupt masking, spinlocks, or any external mutual exclusion
//! - **Singleton variant** (`static-pool` feature): `StaticPool`, a
//!   handle-free pool over inline static storage
//!
//! # Example
//!
//! ```rust
//! use std::mem::MaybeUninit;
//!
//! use chunk_pool::ChunkPool;
//!
//! // Any writable region works; here, a stack buffer.
//! let mut buffer = [MaybeUninit::<u8>::uninit(); 1024];
//!
//! let mut pool: ChunkPool<'_> = ChunkPool::new(&mut buffer, 32)?;
//!
//! // Acquire as many blocks as the layout allows...
//! let first = pool.acquire().expect("fresh pool has free blocks");
//! let second = pool.acquire().expect("capacity is well above two");
//!
//! // ...use the payloads through the returned pointers...
//! // SAFETY: each pointer is valid for chunk_size() bytes until released.
//! unsafe {
//!     first.write_bytes(0x11, pool.chunk_size());
//!     second.write_bytes(0x22, pool.chunk_size());
//! }
//!
//! // ...and hand them back. The most recently released block is the next
//! // one acquired (LIFO).
//! // SAFETY: the pointers came from this pool and are not used afterwards.
//! unsafe {
//!     pool.release(second.as_ptr());
//!     pool.release(first.as_ptr());
//! }
//! assert_eq!(pool.acquire(), Some(first));
//! # Ok::<(), chunk_pool::PoolError>(())
//! ```
//!
//! # What this crate does not do
//!
//! Variable-size allocation, block coalescing or splitting, pool growth,
//! defragmentation, and sharing one buffer between pools are all out of
//! scope. The lock primitive behind [`PoolHooks`] and the policy applied on
//! corruption reports are external collaborators this crate calls into but
//! does not implement.

mod error;
mod hooks;
mod layout;
mod pool;
mod raw;
#[cfg(feature = "static-pool")]
mod static_pool;

pub use error::PoolError;
pub use hooks::{NoHooks, PoolHooks};
pub use pool::ChunkPool;
pub use raw::RawChunkPool;
#[cfg(feature = "static-pool")]
pub use static_pool::StaticPool;
