use std::marker::PhantomData;

/// External collaborators a pool calls out to but never implements.
///
/// A pool is generic over its hooks, so the disabled defaults compile down to
/// nothing: with [`NoHooks`] there is no locking code and no corruption
/// handling code in the produced machine code at all.
///
/// # Locking
///
/// When `lock`/`unlock` are implemented, every [`acquire`][1] and
/// [`release`][2] call brackets its entire body with exactly one matched
/// `lock`/`unlock` pair, on every exit path including early failures. The
/// pool only guarantees the pairing; whether the lock spins, blocks, or does
/// nothing is entirely the implementor's business.
///
/// The pool has no re-entrancy protection: hook implementations must not call
/// back into the pool they are guarding.
///
/// # Corruption reporting
///
/// With the `guard` crate feature enabled, `on_corruption` receives the
/// address of the header whose magic value failed verification. It is invoked
/// exactly once per detection. Detection policy (log, halt, reset) is the
/// implementor's responsibility; the pool merely aborts the operation without
/// mutating its state and without panicking.
///
/// # Example
///
/// ```rust
/// use chunk_pool::PoolHooks;
///
/// struct IrqMaskingHooks;
///
/// impl PoolHooks for IrqMaskingHooks {
///     fn lock() {
///         // e.g. mask interrupts or take a spinlock
///     }
///
///     fn unlock() {
///         // undo whatever lock() did
///     }
/// }
/// ```
///
/// [1]: crate::ChunkPool::acquire
/// [2]: crate::ChunkPool::release
pub trait PoolHooks {
    /// Entered before any pool state is read or written.
    fn lock() {}

    /// Left after the operation body completes, on all exit paths.
    fn unlock() {}

    /// A header's magic value did not match; `addr` is the offending header
    /// (or, on release, the pointer being released).
    fn on_corruption(addr: *const u8) {
        _ = addr;
    }
}

/// The default hooks: no locking, corruption reports are discarded.
#[derive(Debug)]
#[non_exhaustive]
pub struct NoHooks;

impl PoolHooks for NoHooks {}

/// RAII critical section over a [`PoolHooks`] implementation.
///
/// Constructed at the top of every operation body; the `Drop` impl makes it
/// impossible for any return path to skip the `unlock` call.
pub(crate) struct HookSection<H: PoolHooks> {
    _hooks: PhantomData<H>,
}

impl<H: PoolHooks> HookSection<H> {
    pub(crate) fn enter() -> Self {
        H::lock();
        Self {
            _hooks: PhantomData,
        }
    }
}

impl<H: PoolHooks> Drop for HookSection<H> {
    fn drop(&mut self) {
        H::unlock();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn section_pairs_lock_and_unlock() {
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

        {
            let _section = HookSection::<CountingHooks>::enter();
            assert_eq!(LOCKS.load(Ordering::SeqCst), 1);
            assert_eq!(UNLOCKS.load(Ordering::SeqCst), 0);
        }

        assert_eq!(LOCKS.load(Ordering::SeqCst), 1);
        assert_eq!(UNLOCKS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn default_hooks_are_no_ops() {
        // Nothing to observe; this merely exercises the default bodies.
        NoHooks::lock();
        NoHooks::unlock();
        NoHooks::on_corruption(std::ptr::null());
    }
}
