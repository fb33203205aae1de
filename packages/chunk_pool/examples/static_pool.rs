//! Usage example for `StaticPool` (requires the `static-pool` feature).
//!
//! Run with: `cargo run --example static_pool --features static-pool`
//!
//! A static pool reserves its buffer inside a `static` and exposes
//! handle-free acquire/release, the way firmware typically wants a single
//! process-wide block pool.

use chunk_pool::StaticPool;

/// 4 KiB of block storage, reserved at program scope.
static POOL: StaticPool<4096> = StaticPool::new();

fn main() {
    POOL.init(64).expect("first init of a 4 KiB pool");

    let capacity = POOL.capacity().expect("pool is initialized").get();
    println!("Static pool ready: {capacity} blocks of 64 bytes");

    // No handle to thread around: any code in the process can acquire.
    let payload = POOL.acquire().expect("fresh pool has free blocks");

    // SAFETY: the pointer is valid for 64 bytes until released.
    unsafe {
        payload.write_bytes(0xA5, 64);
    }

    println!("Acquired and filled a block at {payload:p}");

    // SAFETY: `payload` came from this pool and is not used afterwards.
    unsafe {
        POOL.release(payload.as_ptr());
    }

    // Re-initialization is refused; the original partitioning stays live.
    assert!(POOL.init(128).is_err());
    println!("Re-init refused, pool still serves {capacity} blocks");
}
