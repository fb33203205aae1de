use std::num::NonZero;

/// Offset value that terminates the free list.
///
/// Offset zero can never name a block because the pool header occupies the
/// aligned start of the buffer, so it doubles as the "no block" sentinel.
pub(crate) const FREE_LIST_END: usize = 0;

/// Pool metadata overlaid at the aligned start of the buffer.
///
/// Living inside the buffer (rather than only in the Rust-side handle) is
/// deliberate: a buffer underrun clobbers this header, which the guard
/// feature can then detect.
#[repr(C)]
pub(crate) struct PoolHeader {
    /// Corruption canary, stamped at init and verified on every operation.
    #[cfg(feature = "guard")]
    pub(crate) magic: usize,

    /// Byte offset (from the buffer base) of the first Free block, or
    /// [`FREE_LIST_END`] when the pool is exhausted.
    pub(crate) free_head: usize,
}

/// Per-block metadata at the start of each fixed-stride block.
///
/// Only meaningful while the block is Free; once acquired, the caller owns
/// the payload and the header bytes of the *next* blocks are what the guard
/// feature watches for overruns.
#[repr(C)]
pub(crate) struct BlockHeader {
    /// Corruption canary, stamped at init and re-verified whenever the block
    /// is reached through the free list.
    #[cfg(feature = "guard")]
    pub(crate) magic: usize,

    /// Byte offset (from the buffer base) of the next Free block, or
    /// [`FREE_LIST_END`] at the tail of the list.
    pub(crate) next_free: usize,
}

/// Rounds `addr` down to the previous `align` boundary (no-op when aligned).
pub(crate) fn align_down(addr: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());

    // Cannot underflow: a power of two is nonzero.
    addr & !align.wrapping_sub(1)
}

/// Rounds `addr` up to the next `align` boundary (no-op when aligned).
///
/// Returns `None` when rounding up would overflow the address space.
pub(crate) fn align_up(addr: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());

    // Cannot underflow: a power of two is nonzero.
    addr.checked_add(align.wrapping_sub(1))
        .map(|bumped| align_down(bumped, align))
}

/// Precomputed byte offsets describing how a pool partitions its buffer.
///
/// All offsets are relative to the (possibly unaligned) buffer base, so the
/// free list built from them is position-independent within the buffer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct PoolLayout {
    /// Offset of the [`PoolHeader`], i.e. the alignment padding consumed at
    /// the front of the buffer.
    pub(crate) header_offset: usize,

    /// Offset of the first block.
    pub(crate) first_block_offset: usize,

    /// Offset of the payload within each block: `align_up(header size)`.
    pub(crate) payload_offset: usize,

    /// Distance between consecutive block start offsets:
    /// `align_up(align_up(header size) + chunk size)`. Constant per pool.
    pub(crate) stride: usize,

    /// Number of whole blocks that fit in the buffer.
    pub(crate) capacity: NonZero<usize>,
}

impl PoolLayout {
    /// Computes the block layout for a buffer at `base_addr` of `size` bytes
    /// partitioned into chunks of `chunk_size` payload bytes.
    ///
    /// Returns `None` when the buffer cannot hold the pool header plus one
    /// whole aligned block, or when the arithmetic would overflow the address
    /// space. A block only counts if its entire stride fits inside the
    /// buffer; a partial trailing block is wasted by construction.
    pub(crate) fn calculate<const ALIGN: usize>(
        base_addr: usize,
        size: usize,
        chunk_size: usize,
    ) -> Option<Self> {
        debug_assert!(chunk_size > 0);

        let header_addr = align_up(base_addr, ALIGN)?;
        let first_block_addr = align_up(
            header_addr.checked_add(size_of::<PoolHeader>())?,
            ALIGN,
        )?;

        let payload_offset = align_up(size_of::<BlockHeader>(), ALIGN)?;
        let stride = align_up(payload_offset.checked_add(chunk_size)?, ALIGN)?;

        let end_addr = base_addr.checked_add(size)?;
        let first_block_end = first_block_addr.checked_add(stride)?;

        if first_block_end > end_addr {
            return None;
        }

        // Cannot underflow: first_block_end <= end_addr implies
        // first_block_addr < end_addr.
        let usable = end_addr.wrapping_sub(first_block_addr);
        let capacity = NonZero::new(usable.checked_div(stride)?)?;

        Some(Self {
            // Cannot underflow: align_up only moves addresses forward.
            header_offset: header_addr.wrapping_sub(base_addr),
            first_block_offset: first_block_addr.wrapping_sub(base_addr),
            payload_offset,
            stride,
            capacity,
        })
    }

    /// Offset one past the last byte of the last block.
    pub(crate) fn blocks_end_offset(&self) -> usize {
        // Cannot overflow: all blocks were proven to fit in the buffer.
        self.first_block_offset
            .wrapping_add(self.capacity.get().wrapping_mul(self.stride))
    }
}

#[cfg(test)]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn align_down_masks_low_bits() {
        assert_eq!(align_down(0, 8), 0);
        assert_eq!(align_down(7, 8), 0);
        assert_eq!(align_down(8, 8), 8);
        assert_eq!(align_down(23, 8), 16);
        assert_eq!(align_down(64, 16), 64);
    }

    #[test]
    fn align_up_is_identity_on_aligned_addresses() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(8, 8), Some(8));
        assert_eq!(align_up(128, 16), Some(128));
    }

    #[test]
    fn align_up_rounds_to_next_boundary() {
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(9, 8), Some(16));
        assert_eq!(align_up(17, 16), Some(32));
    }

    #[test]
    fn align_up_detects_address_space_overflow() {
        assert_eq!(align_up(usize::MAX, 8), None);
        assert_eq!(align_up(usize::MAX - 3, 8), None);
    }

    #[test]
    fn stride_follows_the_formula() {
        let layout = PoolLayout::calculate::<8>(0, 256, 3).unwrap();

        let header_size = size_of::<BlockHeader>();
        let expected_payload_offset = align_up(header_size, 8).unwrap();
        let expected_stride = align_up(expected_payload_offset + 3, 8).unwrap();

        assert_eq!(layout.payload_offset, expected_payload_offset);
        assert_eq!(layout.stride, expected_stride);
    }

    #[test]
    fn capacity_counts_whole_strides_only() {
        // The classic scenario: 256-byte buffer, 3-byte chunks, 8-byte
        // alignment, aligned base. Every byte past the last whole stride is
        // wasted, never handed out as a short block.
        let layout = PoolLayout::calculate::<8>(0, 256, 3).unwrap();

        let usable = 256 - layout.first_block_offset;
        assert_eq!(layout.capacity.get(), usable / layout.stride);
        assert!(layout.blocks_end_offset() <= 256);
    }

    #[cfg(all(target_pointer_width = "64", not(feature = "guard")))]
    #[test]
    fn capacity_256_3_8_without_guard() {
        // header = one usize link, payload offset 8, stride 16,
        // first block at offset 8: (256 - 8) / 16 = 15.
        let layout = PoolLayout::calculate::<8>(0, 256, 3).unwrap();
        assert_eq!(layout.capacity, nz!(15));
    }

    #[cfg(all(target_pointer_width = "64", feature = "guard"))]
    #[test]
    fn capacity_256_3_8_with_guard() {
        // header = magic + link (16 bytes), payload offset 16, stride 24,
        // first block at offset 16: (256 - 16) / 24 = 10.
        let layout = PoolLayout::calculate::<8>(0, 256, 3).unwrap();
        assert_eq!(layout.capacity, nz!(10));
    }

    #[test]
    fn unaligned_base_consumes_leading_padding() {
        let aligned = PoolLayout::calculate::<8>(1024, 256, 3).unwrap();
        let unaligned = PoolLayout::calculate::<8>(1027, 256, 3).unwrap();

        assert_eq!(aligned.header_offset, 0);
        assert_eq!(unaligned.header_offset, 5);
        assert!(unaligned.first_block_offset > aligned.first_block_offset);

        // Stride is a property of chunk size and alignment, not of the base.
        assert_eq!(aligned.stride, unaligned.stride);
    }

    #[test]
    fn too_small_buffer_has_no_layout() {
        // Room for the pool header but not one whole block.
        let too_small = size_of::<PoolHeader>() + 1;
        assert_eq!(PoolLayout::calculate::<8>(0, too_small, 64), None);

        // Chunk effectively larger than the buffer.
        assert_eq!(PoolLayout::calculate::<8>(0, 16, 256), None);
    }

    #[test]
    fn single_block_buffer_has_capacity_one() {
        let layout = PoolLayout::calculate::<8>(0, 256, 3).unwrap();
        let exact = layout.first_block_offset + layout.stride;

        let single = PoolLayout::calculate::<8>(0, exact, 3).unwrap();
        assert_eq!(single.capacity, nz!(1));
    }

    #[test]
    fn wider_alignment_widens_the_stride() {
        let narrow = PoolLayout::calculate::<8>(0, 1024, 3).unwrap();
        let wide = PoolLayout::calculate::<64>(0, 1024, 3).unwrap();

        assert!(wide.stride > narrow.stride);
        assert_eq!(wide.stride % 64, 0);
        assert!(wide.capacity < narrow.capacity);
    }

    #[test]
    fn layout_near_address_space_end_fails_instead_of_wrapping() {
        assert_eq!(PoolLayout::calculate::<8>(usize::MAX - 64, 256, 3), None);
    }
}
