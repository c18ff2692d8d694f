use std::fmt::{self, Debug};
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::free_list::{FreeList, LockFree};
use crate::Pool;

/// Exclusive, scoped ownership of one pooled object.
///
/// `Handle` holds the index of a slot and a reference to the [`Pool`].
/// When it is dropped, or [`release`](Handle::release)d explicitly, the
/// slot is returned to the pool exactly once.
pub struct Handle<'a, T, L: FreeList = LockFree> {
    // `index` is `Some` for the whole life of the handle and taken on release.
    pub(crate) index: Option<usize>,
    pub(crate) pool: &'a Pool<T, L>,
    // Shares `T` across threads only if `T: Sync`.
    pub(crate) _marker: PhantomData<&'a mut T>,
}

impl<'a, T, L: FreeList> Handle<'a, T, L> {
    /// Index of the slot this handle owns, stable for the pool's lifetime.
    pub fn index(&self) -> usize {
        live_index(self.index)
    }

    /// Get the pool the slot belongs to.
    pub fn pool(&self) -> &'a Pool<T, L> {
        self.pool
    }

    /// Return the slot to the pool now instead of at the end of scope.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::LockFreePool;
    ///
    /// let pool: LockFreePool<u32> = LockFreePool::with_capacity(1);
    /// let item = pool.try_acquire().unwrap();
    /// item.release();
    /// assert_eq!(pool.available(), 1);
    /// ```
    pub fn release(mut self) {
        self.release_slot();
    }

    fn release_slot(&mut self) {
        if let Some(index) = self.index.take() {
            self.pool.release(index);
        }
    }
}

impl<'a, T, L: FreeList> Drop for Handle<'a, T, L> {
    fn drop(&mut self) {
        self.release_slot();
    }
}

impl<'a, T, L: FreeList> Deref for Handle<'a, T, L> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        unsafe { self.pool.slot(live_index(self.index)) }
    }
}

impl<'a, T, L: FreeList> DerefMut for Handle<'a, T, L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { self.pool.slot_mut(live_index(self.index)) }
    }
}

impl<'a, T: Debug, L: FreeList> Debug for Handle<'a, T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("value", &**self)
            .finish()
    }
}

impl<'a, T: PartialEq, L: FreeList> PartialEq for Handle<'a, T, L> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<'a, T: Eq, L: FreeList> Eq for Handle<'a, T, L> {}

impl<'a, T: Hash, L: FreeList> Hash for Handle<'a, T, L> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (**self).hash(state)
    }
}

#[cfg(feature = "serde")]
impl<'a, T: serde::Serialize, L: FreeList> serde::Serialize for Handle<'a, T, L> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (**self).serialize(serializer)
    }
}

/// Exclusive ownership of one pooled object that keeps its pool alive.
///
/// `OwnedHandle` holds the index of a slot and an `Arc` reference to the
/// [`Pool`], so it can be sent to other threads independently of the pool.
pub struct OwnedHandle<T, L: FreeList = LockFree> {
    // `index` is `Some` for the whole life of the handle and taken on release.
    pub(crate) index: Option<usize>,
    pub(crate) pool: Arc<Pool<T, L>>,
    pub(crate) _marker: PhantomData<T>,
}

impl<T, L: FreeList> OwnedHandle<T, L> {
    /// Index of the slot this handle owns, stable for the pool's lifetime.
    pub fn index(&self) -> usize {
        live_index(self.index)
    }

    /// Get the pool the slot belongs to.
    pub fn pool(&self) -> &Arc<Pool<T, L>> {
        &self.pool
    }

    /// Return the slot to the pool now instead of at the end of scope.
    pub fn release(mut self) {
        self.release_slot();
    }

    /// Turn the handle into a shared, read-only one. The slot goes back to
    /// the pool when the last clone is dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::LockFreePool;
    /// use std::sync::Arc;
    ///
    /// let pool: Arc<LockFreePool<u32>> = Arc::new(LockFreePool::with_capacity(1));
    /// let shared = pool.try_acquire_owned_with(|x| *x = 7).unwrap().into_shared();
    /// let other = shared.clone();
    /// drop(shared);
    /// assert_eq!(pool.available(), 0);
    /// assert_eq!(*other, 7);
    /// drop(other);
    /// assert_eq!(pool.available(), 1);
    /// ```
    pub fn into_shared(self) -> SharedHandle<T, L> {
        SharedHandle {
            inner: Arc::new(self),
        }
    }

    fn release_slot(&mut self) {
        if let Some(index) = self.index.take() {
            self.pool.release(index);
        }
    }
}

impl<T, L: FreeList> Drop for OwnedHandle<T, L> {
    fn drop(&mut self) {
        self.release_slot();
    }
}

impl<T, L: FreeList> Deref for OwnedHandle<T, L> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        unsafe { self.pool.slot(live_index(self.index)) }
    }
}

impl<T, L: FreeList> DerefMut for OwnedHandle<T, L> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { self.pool.slot_mut(live_index(self.index)) }
    }
}

impl<T: Debug, L: FreeList> Debug for OwnedHandle<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedHandle")
            .field("index", &self.index)
            .field("value", &**self)
            .finish()
    }
}

impl<T: PartialEq, L: FreeList> PartialEq for OwnedHandle<T, L> {
    fn eq(&self, other: &Self) -> bool {
        **self == **other
    }
}

impl<T: Eq, L: FreeList> Eq for OwnedHandle<T, L> {}

impl<T: Hash, L: FreeList> Hash for OwnedHandle<T, L> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        (**self).hash(state)
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize, L: FreeList> serde::Serialize for OwnedHandle<T, L> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (**self).serialize(serializer)
    }
}

/// Reference-counted, read-only ownership of one pooled object.
///
/// Cloning shares the slot; it is released when the last clone is dropped.
pub struct SharedHandle<T, L: FreeList = LockFree> {
    inner: Arc<OwnedHandle<T, L>>,
}

impl<T, L: FreeList> SharedHandle<T, L> {
    /// Number of clones sharing the slot.
    pub fn share_count(this: &Self) -> usize {
        Arc::strong_count(&this.inner)
    }

    /// Get back exclusive ownership if this is the only clone.
    pub fn try_unwrap(this: Self) -> Result<OwnedHandle<T, L>, Self> {
        Arc::try_unwrap(this.inner).map_err(|inner| Self { inner })
    }
}

impl<T, L: FreeList> Clone for SharedHandle<T, L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, L: FreeList> Deref for SharedHandle<T, L> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T: Debug, L: FreeList> Debug for SharedHandle<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedHandle")
            .field("index", &self.inner.index)
            .field("value", &**self)
            .finish()
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize, L: FreeList> serde::Serialize for SharedHandle<T, L> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (**self).serialize(serializer)
    }
}

#[inline]
fn live_index(index: Option<usize>) -> usize {
    match index {
        Some(index) => index,
        None => unreachable!("pooled object used after its slot was released"),
    }
}
