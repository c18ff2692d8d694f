//! A fixed-capacity object pool.
//!
//! # Features
//!
//! - Every object is constructed up front; capacity never changes.
//! - Thread-safe: multiple threads can acquire and release slots concurrently.
//! - Two free lists: [`BlockingPool`] waits for a release when exhausted,
//!   [`LockFreePool`] never waits and reports exhaustion as `None`.
//! - Scoped handles return their slot exactly once, when dropped or
//!   released explicitly.
//! - [`PoolAllocator`] lets node-based containers such as [`NodeMap`] draw
//!   their nodes from a lock-free [`BlockPool`].
//!
//! # Examples
//!
//! ## Local object pool
//!
//! ```rust
//! use slot_pool::LockFreePool;
//!
//! let pool: LockFreePool<u32> = LockFreePool::with_capacity(3);
//! assert_eq!(pool.available(), 3);
//! let r1 = pool.try_acquire().unwrap();
//! let r2 = pool.try_acquire().unwrap();
//! let r3 = pool.try_acquire().unwrap();
//! assert_eq!(*r1, 0);
//! assert!(pool.try_acquire().is_none());
//! drop((r1, r2, r3));
//! assert_eq!(pool.available(), 3);
//! ```
//!
//! ## Multiple threads sharing a blocking pool
//!
//! ```rust
//! use slot_pool::BlockingPool;
//! use std::sync::Arc;
//!
//! let pool: Arc<BlockingPool<u32>> = Arc::new(BlockingPool::with_capacity(2));
//!
//! let workers: Vec<_> = (0..4)
//!     .map(|i| {
//!         let pool = pool.clone();
//!         std::thread::spawn(move || {
//!             for j in 0..10 {
//!                 let mut item = pool.acquire();
//!                 *item = i * 100 + j;
//!             }
//!         })
//!     })
//!     .collect();
//!
//! for worker in workers {
//!     worker.join().unwrap();
//! }
//! assert_eq!(pool.available(), pool.capacity());
//! ```

mod allocator;
mod builder;
mod error;
mod free_list;
mod handle;
mod map;
mod pool;
mod storage;

pub use allocator::{BlockPool, Heap, NodeAllocator, PoolAllocator};
pub use builder::Builder;
pub use error::{AllocError, Error};
pub use free_list::{Blocking, FreeList, LockFree, MAX_CAPACITY};
pub use handle::{Handle, OwnedHandle, SharedHandle};
pub use map::{Iter, NodeMap};
pub use pool::{BlockingPool, Config, LockFreePool, Pool};
