//! Fixed-size block pool and the allocator adapter over it.
//!
//! [`BlockPool`] is a lock-free pool of raw, equally sized blocks.
//! [`PoolAllocator`] exposes it through [`NodeAllocator`], the single
//! element allocation interface consumed by node-based containers such as
//! [`NodeMap`](crate::NodeMap). [`Heap`] implements the same interface on
//! top of the global allocator.

use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::free_list::{FreeList, LockFree, MAX_CAPACITY};
use crate::{AllocError, Error};

/// A lock-free pool of fixed-size memory blocks.
///
/// The whole region is allocated once at construction and freed on drop.
/// Blocks are uninitialized; the free list links them by index, so block
/// contents are never touched by the pool.
///
/// # Example
///
/// ```rust
/// use slot_pool::BlockPool;
///
/// let pool = BlockPool::for_type::<u64>(2).unwrap();
/// let a = pool.allocate().unwrap();
/// let b = pool.allocate().unwrap();
/// assert!(pool.allocate().is_none());
/// unsafe {
///     pool.deallocate(a);
///     pool.deallocate(b);
/// }
/// assert_eq!(pool.approximate_available(), 2);
/// ```
pub struct BlockPool {
    base: NonNull<u8>,
    block: Layout,
    capacity: usize,
    free: LockFree,
}

// The region is only reached through indices popped from the lock-free list.
unsafe impl Send for BlockPool {}
unsafe impl Sync for BlockPool {}

impl BlockPool {
    /// Create a pool of `capacity` blocks, each fitting `block`.
    ///
    /// Zero-sized layouts are widened to their alignment so every block has
    /// a distinct address.
    pub fn new(block: Layout, capacity: usize) -> Result<Self, Error> {
        if capacity > MAX_CAPACITY {
            return Err(Error::CapacityOverflow {
                requested: capacity,
                max: MAX_CAPACITY,
            });
        }
        let block = Layout::from_size_align(block.size().max(block.align()), block.align())?
            .pad_to_align();
        let Some(total) = block.size().checked_mul(capacity) else {
            return Err(Error::CapacityOverflow {
                requested: capacity,
                max: isize::MAX as usize / block.size(),
            });
        };
        let region = Layout::from_size_align(total, block.align())?;
        let base = if total == 0 {
            NonNull::<u8>::dangling()
        } else {
            match NonNull::new(unsafe { alloc::alloc(region) }) {
                Some(base) => base,
                None => alloc::handle_alloc_error(region),
            }
        };
        tracing::debug!(
            block_size = block.size(),
            block_align = block.align(),
            capacity,
            "constructed block pool"
        );
        Ok(Self {
            base,
            block,
            capacity,
            free: LockFree::with_capacity(capacity),
        })
    }

    /// Create a pool of `capacity` blocks sized for `T`.
    pub fn for_type<T>(capacity: usize) -> Result<Self, Error> {
        Self::new(Layout::new::<T>(), capacity)
    }

    /// Layout of a single block.
    pub fn block_layout(&self) -> Layout {
        self.block
    }

    /// Get the capacity of the pool.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Count free blocks. Racy under concurrent use, diagnostic only.
    pub fn approximate_available(&self) -> usize {
        self.free.len()
    }

    /// Take a block without waiting. Return `None` if the pool is exhausted.
    pub fn allocate(&self) -> Option<NonNull<u8>> {
        let index = self.free.try_pop()?;
        Some(unsafe { self.base.add(index * self.block.size()) })
    }

    /// Return a block to the pool.
    ///
    /// # Safety
    ///
    /// `block` must come from [`allocate`](Self::allocate) on this pool and
    /// must not be used or deallocated again afterwards.
    pub unsafe fn deallocate(&self, block: NonNull<u8>) {
        let offset = block.addr().get().wrapping_sub(self.base.addr().get());
        debug_assert_eq!(offset % self.block.size(), 0, "pointer is not a block start");
        let index = offset / self.block.size();
        debug_assert!(index < self.capacity, "pointer does not belong to this pool");
        self.free.push(index);
    }

    /// Check whether a layout fits into one block.
    fn fits(&self, layout: Layout) -> bool {
        layout.size() <= self.block.size() && layout.align() <= self.block.align()
    }
}

impl Drop for BlockPool {
    fn drop(&mut self) {
        let total = self.block.size() * self.capacity;
        if total != 0 {
            // Same layout as in `new`, which validated it.
            let region = unsafe { Layout::from_size_align_unchecked(total, self.block.align()) };
            unsafe { alloc::dealloc(self.base.as_ptr(), region) };
        }
    }
}

impl fmt::Debug for BlockPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockPool")
            .field("block", &self.block)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Allocation interface for node-based containers.
///
/// `allocate` hands out uninitialized memory for `count` values of `T`;
/// `rebind` yields an allocator for another element type drawing from the
/// same memory source, the way a container turns an allocator for its
/// values into one for its internal nodes.
///
/// # Safety
///
/// A pointer returned by `allocate(count)` must stay valid for reads and
/// writes of `count` values of `T` until it is passed to `deallocate` on an
/// allocator that compares equal, and allocators comparing equal must be able
/// to free each other's memory.
pub unsafe trait NodeAllocator<T>: Clone + PartialEq {
    /// This allocator for another element type.
    type Rebind<U>: NodeAllocator<U>;

    /// Get an allocator for `U` bound to the same memory source.
    fn rebind<U>(&self) -> Self::Rebind<U>;

    /// Allocate uninitialized memory for `count` values.
    fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError>;

    /// Free memory from [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate(count)` on an equal allocator, with
    /// the same `count`, and must not be freed twice.
    unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize);
}

/// A [`NodeAllocator`] serving single nodes from a [`BlockPool`].
///
/// Two pool allocators are equal exactly when they draw from the same pool,
/// whatever their element types.
///
/// # Example
///
/// ```rust
/// use slot_pool::{AllocError, BlockPool, NodeAllocator, PoolAllocator};
///
/// let pool = BlockPool::for_type::<u64>(4).unwrap();
/// let alloc = PoolAllocator::<u64>::new(&pool);
/// assert_eq!(alloc.allocate(2), Err(AllocError::UnsupportedCount(2)));
///
/// let node = alloc.allocate(1).unwrap();
/// let bytes = alloc.rebind::<u32>();
/// assert!(alloc == bytes);
/// unsafe { bytes.rebind::<u64>().deallocate(node, 1) };
/// ```
pub struct PoolAllocator<'p, T> {
    pool: &'p BlockPool,
    _marker: PhantomData<fn() -> T>,
}

impl<'p, T> PoolAllocator<'p, T> {
    /// Create an allocator drawing from `pool`.
    pub fn new(pool: &'p BlockPool) -> Self {
        Self {
            pool,
            _marker: PhantomData,
        }
    }

    /// Get the pool backing this allocator.
    pub fn pool(&self) -> &'p BlockPool {
        self.pool
    }
}

impl<T> Clone for PoolAllocator<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PoolAllocator<'_, T> {}

impl<'p, T, U> PartialEq<PoolAllocator<'p, U>> for PoolAllocator<'p, T> {
    fn eq(&self, other: &PoolAllocator<'p, U>) -> bool {
        ptr::eq(self.pool, other.pool)
    }
}

impl<T> Eq for PoolAllocator<'_, T> {}

impl<T> fmt::Debug for PoolAllocator<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("pool", &ptr::from_ref(self.pool))
            .finish()
    }
}

unsafe impl<'p, T> NodeAllocator<T> for PoolAllocator<'p, T> {
    type Rebind<U> = PoolAllocator<'p, U>;

    fn rebind<U>(&self) -> PoolAllocator<'p, U> {
        PoolAllocator::new(self.pool)
    }

    fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError> {
        if count != 1 {
            return Err(AllocError::UnsupportedCount(count));
        }
        let layout = Layout::new::<T>();
        if !self.pool.fits(layout) {
            return Err(AllocError::LayoutMismatch {
                size: layout.size(),
                align: layout.align(),
            });
        }
        self.pool
            .allocate()
            .map(NonNull::cast)
            .ok_or(AllocError::Exhausted)
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        debug_assert_eq!(count, 1);
        unsafe { self.pool.deallocate(ptr.cast()) }
    }
}

/// A [`NodeAllocator`] backed by the global allocator.
pub struct Heap<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Heap<T> {
    /// Create a heap allocator.
    pub const fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Heap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Heap<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Heap<T> {}

impl<T, U> PartialEq<Heap<U>> for Heap<T> {
    fn eq(&self, _: &Heap<U>) -> bool {
        true
    }
}

impl<T> Eq for Heap<T> {}

impl<T> fmt::Debug for Heap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Heap")
    }
}

unsafe impl<T> NodeAllocator<T> for Heap<T> {
    type Rebind<U> = Heap<U>;

    fn rebind<U>(&self) -> Heap<U> {
        Heap::new()
    }

    fn allocate(&self, count: usize) -> Result<NonNull<T>, AllocError> {
        let layout = Layout::array::<T>(count).map_err(|_| AllocError::LayoutOverflow(count))?;
        if layout.size() == 0 {
            return Ok(NonNull::dangling());
        }
        match NonNull::new(unsafe { alloc::alloc(layout) }) {
            Some(ptr) => Ok(ptr.cast()),
            None => alloc::handle_alloc_error(layout),
        }
    }

    unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        // `allocate` succeeded with the same count, so the layout is valid.
        let Ok(layout) = Layout::array::<T>(count) else {
            return;
        };
        if layout.size() != 0 {
            unsafe { alloc::dealloc(ptr.as_ptr().cast(), layout) };
        }
    }
}
