use thiserror::Error;

/// Errors that can occur when initializing a pool.
///
/// Only initialization is fallible in the error sense: an exhausted pool
/// yields `None` from `acquire` as a normal empty result, and corruption
/// detections are routed to [`PoolHooks::on_corruption`][1] instead of being
/// surfaced as values.
///
/// [1]: crate::PoolHooks::on_corruption
#[derive(Clone, Copy, Debug, Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum PoolError {
    /// The raw-layer constructor was given a null buffer pointer.
    #[error("buffer pointer is null")]
    NullBuffer,

    /// The buffer has zero length.
    #[error("buffer size is zero")]
    ZeroSize,

    /// The requested chunk size is zero.
    #[error("chunk size is zero")]
    ZeroChunkSize,

    /// The buffer is too small to hold the pool header plus one whole
    /// aligned block of the requested chunk size.
    #[error(
        "buffer of {size} bytes cannot hold one {chunk_size}-byte chunk plus pool and block headers"
    )]
    InsufficientCapacity {
        /// The buffer size that was offered.
        size: usize,

        /// The chunk size that was requested.
        chunk_size: usize,
    },

    /// The static pool has already been initialized; re-initializing over
    /// live allocations is refused.
    #[cfg(feature = "static-pool")]
    #[error("static pool is already initialized")]
    AlreadyInitialized,
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(PoolError: Send, Sync, Debug);

    #[test]
    fn messages_name_the_offending_sizes() {
        let error = PoolError::InsufficientCapacity {
            size: 16,
            chunk_size: 256,
        };

        let message = error.to_string();
        assert!(message.contains("16"));
        assert!(message.contains("256"));
    }
}
