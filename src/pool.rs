use std::convert::Infallible;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use crate::free_list::{Blocking, FreeList, LockFree, MAX_CAPACITY};
use crate::storage::Slots;
use crate::{Error, Handle, OwnedHandle};

/// A pool whose `acquire` waits for a free slot.
pub type BlockingPool<T> = Pool<T, Blocking>;

/// A pool whose `try_acquire` never waits and reports exhaustion as `None`.
pub type LockFreePool<T> = Pool<T, LockFree>;

/// A fixed-capacity pool of pre-constructed objects.
///
/// Every slot is built when the pool is created and lives as long as the
/// pool. Acquiring a slot yields a handle with exclusive access to the
/// object; dropping the handle returns the slot to the free list `L`.
///
/// # Examples
///
/// ```rust
/// use slot_pool::LockFreePool;
/// use std::sync::{Arc, mpsc};
///
/// let pool: Arc<LockFreePool<String>> = Arc::new(LockFreePool::with_capacity(10));
///
/// let (tx, rx) = mpsc::channel();
/// let clone_pool = pool.clone();
/// let tx1 = tx.clone();
/// let sender1 = std::thread::spawn(move || {
///     let item = clone_pool.try_acquire_owned_with(|x| x.push_str("1")).unwrap();
///     tx1.send((1, item)).unwrap();
/// });
///
/// let clone_pool = pool.clone();
/// let sender2 = std::thread::spawn(move || {
///     let item = clone_pool.try_acquire_owned_with(|x| x.push_str("2")).unwrap();
///     tx.send((2, item)).unwrap();
/// });
///
/// let receiver = std::thread::spawn(move || {
///     for _ in 0..2 {
///         let (id, item) = rx.recv().unwrap();
///         if id == 1 {
///             assert_eq!(*item, "1");
///         } else {
///             assert_eq!(*item, "2");
///         }
///     }
/// });
///
/// sender1.join().unwrap();
/// sender2.join().unwrap();
/// receiver.join().unwrap();
/// assert_eq!(pool.available(), 10);
/// ```
pub struct Pool<T, L: FreeList = LockFree> {
    /// Configuration of the pool.
    config: Config<T>,
    /// Backing instances, one per slot.
    slots: Slots<T>,
    /// Indices of the slots not held by any handle.
    free: L,
}

impl<T, L: FreeList> fmt::Debug for Pool<T, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

impl<T: Default, L: FreeList> Pool<T, L> {
    /// Create a pool of `capacity` default-constructed objects.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` exceeds the number of slots a free list can
    /// index (`u32::MAX`).
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::LockFreePool;
    ///
    /// let pool: LockFreePool<u32> = LockFreePool::with_capacity(10);
    /// assert_eq!(pool.capacity(), 10);
    /// assert_eq!(pool.available(), 10);
    /// let item = pool.try_acquire().unwrap();
    /// assert_eq!(pool.available(), 9);
    /// ```
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_config(Config {
            capacity,
            ..Default::default()
        })
    }

    /// Create a pool of default-constructed objects with the given configuration.
    ///
    /// # Panics
    ///
    /// Panics if `config.capacity` exceeds `u32::MAX`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::{BlockingPool, Config};
    ///
    /// let mut config = Config::default();
    /// config.capacity = 1;
    /// config.reset_func = Some(String::clear);
    /// let pool: BlockingPool<String> = BlockingPool::with_config(config);
    /// let item = pool.acquire_with(|s| s.push_str("Hello, World!"));
    /// assert_eq!(&*item, "Hello, World!");
    /// drop(item);
    /// let item2 = pool.acquire();
    /// assert_eq!(&*item2, "");
    /// ```
    pub fn with_config(config: Config<T>) -> Self {
        match Self::try_with_config(config, |_| Ok::<_, Infallible>(T::default())) {
            Ok(pool) => pool,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<T, L: FreeList> Pool<T, L> {
    /// Create a pool of `capacity` objects built by `init`, which receives
    /// the slot index.
    ///
    /// Construction is all or nothing: the first failing `init` aborts it
    /// and the objects built so far are dropped.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::{Error, LockFreePool};
    ///
    /// let pool = LockFreePool::try_with_init(3, |i| Ok::<_, Error>(vec![0u8; i])).unwrap();
    /// assert_eq!(pool.capacity(), 3);
    ///
    /// let failed = LockFreePool::<u8>::try_with_init(3, |i| {
    ///     if i == 2 { Err("out of resources") } else { Ok(0) }
    /// });
    /// assert!(matches!(failed, Err(Error::Construction { index: 2, .. })));
    /// ```
    pub fn try_with_init<E, F>(capacity: usize, init: F) -> Result<Self, Error>
    where
        F: FnMut(usize) -> Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::try_with_config(
            Config {
                capacity,
                ..Default::default()
            },
            init,
        )
    }

    /// Create a pool with the given configuration and per-slot initializer.
    pub fn try_with_config<E, F>(config: Config<T>, init: F) -> Result<Self, Error>
    where
        F: FnMut(usize) -> Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        if config.capacity > MAX_CAPACITY {
            return Err(Error::CapacityOverflow {
                requested: config.capacity,
                max: MAX_CAPACITY,
            });
        }
        let slots = Slots::try_new(config.capacity, init).map_err(|(index, source)| {
            tracing::debug!(index, capacity = config.capacity, "slot construction failed");
            Error::Construction {
                index,
                source: source.into(),
            }
        })?;
        tracing::debug!(capacity = config.capacity, "constructed object pool");
        Ok(Self {
            free: L::with_capacity(config.capacity),
            slots,
            config,
        })
    }

    /// Get the capacity of the pool. It never changes.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Get the number of free slots.
    ///
    /// Diagnostic only: other threads may change it right after the call.
    /// For a [`LockFreePool`] the count comes from a walk over concurrently
    /// mutated links, see [`LockFreePool::approximate_available`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::BlockingPool;
    ///
    /// let pool: BlockingPool<u32> = BlockingPool::with_capacity(3);
    /// let r1 = pool.acquire();
    /// let r2 = pool.acquire();
    /// assert_eq!(pool.available(), 1);
    /// drop(r1);
    /// drop(r2);
    /// assert_eq!(pool.available(), 3);
    /// ```
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Get the number of slots held by handles.
    pub fn in_use(&self) -> usize {
        self.capacity() - self.available().min(self.capacity())
    }

    /// Check whether every slot is in use.
    pub fn is_exhausted(&self) -> bool {
        self.free.is_empty()
    }

    /// Acquire a slot without waiting. Return `None` if the pool is exhausted.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::LockFreePool;
    ///
    /// let pool: LockFreePool<u32> = LockFreePool::with_capacity(1);
    /// let item = pool.try_acquire().unwrap();
    /// assert!(pool.try_acquire().is_none());
    /// drop(item);
    /// assert!(pool.try_acquire().is_some());
    /// ```
    pub fn try_acquire(&self) -> Option<Handle<'_, T, L>> {
        self.try_acquire_index().map(|index| self.wrap(index))
    }

    /// Acquire a slot without waiting and apply `func` to its object.
    /// Return `None` if the pool is exhausted.
    pub fn try_acquire_with<F>(&self, func: F) -> Option<Handle<'_, T, L>>
    where
        F: FnOnce(&mut T),
    {
        self.try_acquire().map(|mut handle| {
            func(&mut *handle);
            handle
        })
    }

    /// Acquire a slot without waiting, keeping the pool alive through the
    /// handle. Return `None` if the pool is exhausted.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::LockFreePool;
    /// use std::sync::Arc;
    ///
    /// let pool: Arc<LockFreePool<u32>> = Arc::new(LockFreePool::with_capacity(2));
    /// let item = pool.try_acquire_owned().unwrap();
    /// drop(pool);
    /// assert_eq!(*item, 0);
    /// ```
    pub fn try_acquire_owned(self: &Arc<Self>) -> Option<OwnedHandle<T, L>> {
        self.try_acquire_index().map(|index| self.wrap_owned(index))
    }

    /// Owned variant of [`try_acquire_with`](Self::try_acquire_with).
    pub fn try_acquire_owned_with<F>(self: &Arc<Self>, func: F) -> Option<OwnedHandle<T, L>>
    where
        F: FnOnce(&mut T),
    {
        self.try_acquire_owned().map(|mut handle| {
            func(&mut *handle);
            handle
        })
    }

    fn try_acquire_index(&self) -> Option<usize> {
        let index = self.free.try_pop();
        if index.is_none() {
            tracing::trace!(capacity = self.capacity(), "pool exhausted");
        }
        index
    }

    fn wrap(&self, index: usize) -> Handle<'_, T, L> {
        self.slots.claim(index);
        Handle {
            index: Some(index),
            pool: self,
            _marker: PhantomData,
        }
    }

    fn wrap_owned(self: &Arc<Self>, index: usize) -> OwnedHandle<T, L> {
        self.slots.claim(index);
        OwnedHandle {
            index: Some(index),
            pool: self.clone(),
            _marker: PhantomData,
        }
    }

    /// # Safety
    ///
    /// The caller must be the handle currently owning `index`.
    #[inline]
    pub(crate) unsafe fn slot(&self, index: usize) -> &T {
        unsafe { self.slots.get(index) }
    }

    /// # Safety
    ///
    /// The caller must be the handle currently owning `index`, borrowed mutably.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn slot_mut(&self, index: usize) -> &mut T {
        unsafe { self.slots.get_mut(index) }
    }

    /// Return a slot to the free list. Only a handle ending its ownership
    /// calls this, once per acquisition.
    pub(crate) fn release(&self, index: usize) {
        // Pushed back on drop so a panicking reset hook cannot lose the slot.
        let _recycle = Recycle { pool: self, index };
        if let Some(func) = self.config.reset_func {
            // Still exclusive: the index is not in the free list yet.
            func(unsafe { self.slots.get_mut(index) });
        }
    }
}

struct Recycle<'a, T, L: FreeList> {
    pool: &'a Pool<T, L>,
    index: usize,
}

impl<T, L: FreeList> Drop for Recycle<'_, T, L> {
    fn drop(&mut self) {
        self.pool.slots.unclaim(self.index);
        self.pool.free.push(self.index);
    }
}

impl<T> Pool<T, Blocking> {
    /// Acquire a slot, waiting until one is released if the pool is exhausted.
    ///
    /// A pool with zero capacity never returns.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::BlockingPool;
    /// use std::sync::Arc;
    ///
    /// let pool: Arc<BlockingPool<u32>> = Arc::new(BlockingPool::with_capacity(1));
    /// let held = pool.acquire_owned();
    /// let clone_pool = pool.clone();
    /// let waiter = std::thread::spawn(move || *clone_pool.acquire());
    /// drop(held);
    /// assert_eq!(waiter.join().unwrap(), 0);
    /// ```
    pub fn acquire(&self) -> Handle<'_, T, Blocking> {
        let index = self.free.pop_wait();
        self.wrap(index)
    }

    /// Acquire a slot, waiting if needed, and apply `func` to its object.
    pub fn acquire_with<F>(&self, func: F) -> Handle<'_, T, Blocking>
    where
        F: FnOnce(&mut T),
    {
        let mut handle = self.acquire();
        func(&mut *handle);
        handle
    }

    /// Acquire a slot, waiting if needed, keeping the pool alive through the handle.
    pub fn acquire_owned(self: &Arc<Self>) -> OwnedHandle<T, Blocking> {
        let index = self.free.pop_wait();
        self.wrap_owned(index)
    }

    /// Owned variant of [`acquire_with`](Self::acquire_with).
    pub fn acquire_owned_with<F>(self: &Arc<Self>, func: F) -> OwnedHandle<T, Blocking>
    where
        F: FnOnce(&mut T),
    {
        let mut handle = self.acquire_owned();
        func(&mut *handle);
        handle
    }

    /// Acquire a slot, waiting at most `timeout`. Return `None` if no slot
    /// was released in time.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::BlockingPool;
    /// use std::time::Duration;
    ///
    /// let pool: BlockingPool<u32> = BlockingPool::with_capacity(1);
    /// let _held = pool.acquire();
    /// assert!(pool.acquire_timeout(Duration::from_millis(10)).is_none());
    /// ```
    pub fn acquire_timeout(&self, timeout: Duration) -> Option<Handle<'_, T, Blocking>> {
        self.free
            .pop_wait_for(timeout)
            .map(|index| self.wrap(index))
    }

    /// Owned variant of [`acquire_timeout`](Self::acquire_timeout).
    pub fn acquire_owned_timeout(
        self: &Arc<Self>,
        timeout: Duration,
    ) -> Option<OwnedHandle<T, Blocking>> {
        self.free
            .pop_wait_for(timeout)
            .map(|index| self.wrap_owned(index))
    }
}

impl<T> Pool<T, LockFree> {
    /// Count the free slots by walking the lock-free free list.
    ///
    /// The walk races with concurrent acquires and releases and may return
    /// a torn count. Use it for diagnostics only. Once all threads are
    /// quiescent it equals `capacity() - outstanding handles`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::LockFreePool;
    ///
    /// let pool: LockFreePool<u32> = LockFreePool::with_capacity(4);
    /// let a = pool.try_acquire().unwrap();
    /// let b = pool.try_acquire().unwrap();
    /// assert_eq!(pool.approximate_available(), 2);
    /// drop(a);
    /// drop(b);
    /// assert_eq!(pool.approximate_available(), 4);
    /// ```
    pub fn approximate_available(&self) -> usize {
        self.free.len()
    }
}

/// Configuration for the pool.
pub struct Config<T> {
    /// Number of slots, all constructed up front.
    pub capacity: usize,
    /// Optional function to reset an object before its slot is reused.
    pub reset_func: Option<fn(&mut T)>,
}

impl<T> fmt::Debug for Config<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("capacity", &self.capacity)
            .field("reset_func", &self.reset_func.is_some())
            .finish()
    }
}

impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            reset_func: self.reset_func,
        }
    }
}

impl<T> Default for Config<T> {
    fn default() -> Self {
        Self {
            capacity: 1024,
            reset_func: None,
        }
    }
}
