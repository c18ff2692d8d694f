use crate::free_list::{Blocking, FreeList, LockFree};
use crate::{Config, Error, Pool};

/// A builder for creating a [`Pool`] with custom configuration.
///
/// # Example
///
/// ```rust
/// use slot_pool::Builder;
///
/// let mut builder = Builder::<usize>::new();
/// let pool = builder.capacity(10).build_lock_free();
/// assert_eq!(pool.capacity(), 10);
/// ```
pub struct Builder<T> {
    /// Configuration of the pool.
    config: Config<T>,
}

impl<T> Default for Builder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Builder<T> {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Set the number of slots in the pool.
    pub fn capacity(&mut self, capacity: usize) -> &mut Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the function to reset an object before its slot is reused.
    pub fn reset_func(&mut self, func: fn(&mut T)) -> &mut Self {
        self.config.reset_func = Some(func);
        self
    }

    /// Build a pool backed by the free list `L`, building every object
    /// with `init`.
    pub fn try_build_with<L, E, F>(&mut self, init: F) -> Result<Pool<T, L>, Error>
    where
        L: FreeList,
        F: FnMut(usize) -> Result<T, E>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let config = std::mem::take(&mut self.config);
        Pool::try_with_config(config, init)
    }
}

impl<T: Default> Builder<T> {
    /// Build a pool backed by the free list `L` with the current configuration.
    pub fn build<L: FreeList>(&mut self) -> Pool<T, L> {
        let config = std::mem::take(&mut self.config);
        Pool::with_config(config)
    }

    /// Build a pool whose `acquire` waits for a free slot.
    pub fn build_blocking(&mut self) -> Pool<T, Blocking> {
        self.build()
    }

    /// Build a pool whose `try_acquire` never waits.
    pub fn build_lock_free(&mut self) -> Pool<T, LockFree> {
        self.build()
    }
}
