//! Free lists tracking which slot indices are available.
//!
//! A slot index is either in the free list (free) or held by exactly one
//! handle (in use). Both implementations hand out indices in LIFO order so a
//! recently released slot, still warm in cache, is reused first.

mod blocking;
mod lock_free;

pub use blocking::Blocking;
pub use lock_free::LockFree;

/// Largest number of slots a free list can index.
pub const MAX_CAPACITY: usize = u32::MAX as usize;

/// Bookkeeping for the free slots of a pool.
///
/// # Safety
///
/// Pools hand out `&mut` access based on popped indices, so an
/// implementation must never return an index that is already popped and
/// not pushed back, and must only return indices below its capacity.
pub unsafe trait FreeList: Send + Sync + Sized {
    /// Create a free list with every index in `0..capacity` available.
    ///
    /// `capacity` must not exceed [`MAX_CAPACITY`].
    fn with_capacity(capacity: usize) -> Self;

    /// Remove an available index without waiting. Return `None` if every
    /// index is in use.
    fn try_pop(&self) -> Option<usize>;

    /// Make `index` available again.
    ///
    /// `index` must have been returned by `try_pop` (or a blocking pop) and
    /// not pushed since.
    fn push(&self, index: usize);

    /// Number of available indices.
    ///
    /// Exact when no pop or push is in flight; under concurrency the value
    /// is a snapshot that may already be stale.
    fn len(&self) -> usize;

    /// Whether no index is available.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
