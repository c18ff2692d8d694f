use std::alloc::LayoutError;

/// Errors raised while building a pool.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The requested slot count cannot be indexed by the free list.
    #[error("pool capacity {requested} exceeds the maximum of {max} slots")]
    CapacityOverflow {
        /// The capacity the caller asked for.
        requested: usize,
        /// The largest supported capacity.
        max: usize,
    },

    /// The initializer failed for one slot. No pool is returned and every
    /// instance built before the failure is dropped.
    #[error("failed to construct slot {index}")]
    Construction {
        /// Index of the slot whose instance failed to construct.
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The block layout of a [`BlockPool`](crate::BlockPool) is not representable.
    #[error("invalid block layout")]
    Layout(#[from] LayoutError),
}

/// Errors returned by a [`NodeAllocator`](crate::NodeAllocator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum AllocError {
    /// Pool-backed allocators hand out exactly one node per request.
    #[error("pool allocator serves one node per request, {0} were requested")]
    UnsupportedCount(usize),

    /// The element type does not fit into one block of the pool.
    #[error("node layout (size {size}, align {align}) does not fit the pool's blocks")]
    LayoutMismatch {
        /// Size of the rejected element type.
        size: usize,
        /// Alignment of the rejected element type.
        align: usize,
    },

    /// Every block of the pool is currently handed out.
    #[error("pool exhausted")]
    Exhausted,

    /// `count` elements do not fit in the address space.
    #[error("layout overflow for {0} elements")]
    LayoutOverflow(usize),
}
