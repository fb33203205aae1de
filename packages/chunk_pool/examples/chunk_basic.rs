//! Basic usage example for `ChunkPool`.
//!
//! This example partitions a stack buffer into fixed-size chunks, drains the
//! pool, and demonstrates the LIFO reuse order of released blocks.

use std::mem::MaybeUninit;

use chunk_pool::{ChunkPool, NoHooks};

fn main() {
    // Any writable region works; here, a buffer on the stack.
    let mut buffer = [MaybeUninit::<u8>::uninit(); 512];

    let mut pool =
        ChunkPool::<NoHooks>::new(&mut buffer, 24).expect("buffer fits many 24-byte chunks");

    println!(
        "Created pool: {} blocks of {} payload bytes (stride {})",
        pool.capacity(),
        pool.chunk_size(),
        pool.stride()
    );

    // Acquire a pair of blocks and fill their payloads.
    let first = pool.acquire().expect("fresh pool has free blocks");
    let second = pool.acquire().expect("capacity is well above two");

    // SAFETY: each pointer is valid for chunk_size() bytes until released.
    unsafe {
        first.write_bytes(0x11, pool.chunk_size());
        second.write_bytes(0x22, pool.chunk_size());
    }

    println!("Acquired two blocks at {first:p} and {second:p}");

    // Release them; the most recently released block comes back first.
    // SAFETY: both pointers came from this pool and are not used afterwards.
    unsafe {
        pool.release(first.as_ptr());
        pool.release(second.as_ptr());
    }

    let reused = pool.acquire().expect("just released two blocks");
    assert_eq!(reused, second);
    println!("LIFO reuse: got {reused:p} back immediately");

    // Drain the pool completely; exhaustion is a normal empty result.
    let mut count = 1_usize; // `reused` is already out.
    while pool.acquire().is_some() {
        count += 1;
    }

    assert_eq!(count, pool.capacity().get());
    println!("Drained all {count} blocks; the next acquire returned None");
}
