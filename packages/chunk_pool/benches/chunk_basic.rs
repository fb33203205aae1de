//! Basic benchmarks for the `chunk_pool` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::mem::MaybeUninit;
use std::time::Instant;

use alloc_tracker::Allocator;
use chunk_pool::{ChunkPool, NoHooks};
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

// Tracking heap traffic is the point here: a fixed-chunk pool must not touch
// the heap at all once its buffer exists.
#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

const BUFFER_SIZE: usize = 64 * 1024;
const CHUNK_SIZE: usize = 48;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("chunk_basic");

    let allocs_op = allocs.operation("init");
    group.bench_function("init", |b| {
        b.iter_custom(|iters| {
            let mut buffer = vec![MaybeUninit::<u8>::uninit(); BUFFER_SIZE];

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(
                    ChunkPool::<NoHooks>::new(black_box(buffer.as_mut_slice()), CHUNK_SIZE)
                        .unwrap(),
                ));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("acquire_release_cycle");
    group.bench_function("acquire_release_cycle", |b| {
        b.iter_custom(|iters| {
            let mut buffer = vec![MaybeUninit::<u8>::uninit(); BUFFER_SIZE];
            let mut pool = ChunkPool::<NoHooks>::new(buffer.as_mut_slice(), CHUNK_SIZE).unwrap();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let payload = black_box(pool.acquire().unwrap());

                // SAFETY: freshly acquired from this pool, released below.
                unsafe {
                    pool.release(payload.as_ptr());
                }
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("drain_refill");
    group.bench_function("drain_refill", |b| {
        b.iter_custom(|iters| {
            let mut buffer = vec![MaybeUninit::<u8>::uninit(); BUFFER_SIZE];
            let mut pool = ChunkPool::<NoHooks>::new(buffer.as_mut_slice(), CHUNK_SIZE).unwrap();
            let mut acquired = Vec::with_capacity(pool.capacity().get());

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                while let Some(payload) = pool.acquire() {
                    acquired.push(payload);
                }

                for payload in acquired.drain(..) {
                    // SAFETY: acquired from this pool in the loop above.
                    unsafe {
                        pool.release(payload.as_ptr());
                    }
                }
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
