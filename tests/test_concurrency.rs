use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering::*;
use std::sync::{Arc, Barrier, mpsc};
use std::time::Duration;

use slot_pool::{BlockingPool, LockFreePool};

#[test]
fn fourth_blocking_acquire_waits_for_a_drop() {
    let pool = Arc::new(BlockingPool::<u32>::with_capacity(3));
    let mut held: Vec<_> = (0..3).map(|_| pool.acquire_owned()).collect();
    assert_eq!(pool.available(), 0);

    let (tx, rx) = mpsc::channel();
    let clone_pool = pool.clone();
    let waiter = std::thread::spawn(move || {
        let handle = clone_pool.acquire_owned();
        tx.send(handle.index()).unwrap();
    });

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    let released = held.pop().unwrap();
    let released_index = released.index();
    drop(released);
    assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), released_index);
    waiter.join().unwrap();
    drop(held);
    assert_eq!(pool.available(), 3);
}

#[test]
fn blocking_acquire_timeout_expires_then_succeeds() {
    let pool = Arc::new(BlockingPool::<u32>::with_capacity(1));
    let held = pool.acquire_owned();
    assert!(pool.acquire_owned_timeout(Duration::from_millis(20)).is_none());

    let clone_pool = pool.clone();
    let waiter = std::thread::spawn(move || {
        clone_pool
            .acquire_timeout(Duration::from_secs(10))
            .map(|h| h.index())
    });
    std::thread::sleep(Duration::from_millis(20));
    drop(held);
    assert_eq!(waiter.join().unwrap(), Some(0));
}

#[test]
fn unbounded_timeout_returns_a_free_slot() {
    let pool = Arc::new(BlockingPool::<u32>::with_capacity(1));
    let held = pool.acquire_timeout(Duration::MAX).unwrap();
    assert_eq!(held.index(), 0);
    drop(held);
    assert!(pool.acquire_owned_timeout(Duration::MAX).is_some());
}

#[test]
fn blocking_pool_many_threads_small_pool() {
    let pool = Arc::new(BlockingPool::<u32>::with_capacity(5));
    let workers: Vec<_> = (0..10)
        .map(|i| {
            let pool = pool.clone();
            std::thread::spawn(move || {
                for j in 0..50 {
                    let mut obj = pool.acquire();
                    *obj = i * 100 + j;
                    std::thread::sleep(Duration::from_micros(100));
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(pool.available(), pool.capacity());
}

/// Runs `acquire` with a per-thread id (starting at 1) from all threads at once.
/// The callers tag each slot with that id while holding it and reset it to 0.
fn hammer_exclusive<F>(threads: usize, iterations: usize, acquire: F)
where
    F: Fn(usize) -> bool + Send + Sync + 'static,
{
    let acquire = Arc::new(acquire);
    let barrier = Arc::new(Barrier::new(threads));
    let workers: Vec<_> = (1..=threads)
        .map(|id| {
            let acquire = acquire.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                let mut hits = 0;
                for _ in 0..iterations {
                    if acquire(id) {
                        hits += 1;
                    }
                }
                hits
            })
        })
        .collect();
    let hits: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
    assert!(hits > 0);
}

#[test]
fn lock_free_slots_never_shared() {
    const CAPACITY: usize = 4;
    let pool = Arc::new(LockFreePool::<AtomicUsize>::with_capacity(CAPACITY));
    let outstanding = Arc::new(AtomicUsize::new(0));
    let max_outstanding = Arc::new(AtomicUsize::new(0));

    let (p, o, m) = (pool.clone(), outstanding.clone(), max_outstanding.clone());
    hammer_exclusive(8, 20_000, move |id| {
        let Some(slot) = p.try_acquire() else {
            return false;
        };
        let now = o.fetch_add(1, SeqCst) + 1;
        m.fetch_max(now, SeqCst);
        assert_eq!(slot.swap(id, SeqCst), 0, "slot {} already owned", slot.index());
        std::hint::spin_loop();
        assert_eq!(slot.swap(0, SeqCst), id);
        o.fetch_sub(1, SeqCst);
        true
    });

    assert!(max_outstanding.load(SeqCst) <= CAPACITY);
    assert_eq!(pool.approximate_available(), CAPACITY);
}

#[test]
fn blocking_slots_never_shared() {
    const CAPACITY: usize = 3;
    let pool = Arc::new(BlockingPool::<AtomicUsize>::with_capacity(CAPACITY));
    let outstanding = Arc::new(AtomicUsize::new(0));
    let max_outstanding = Arc::new(AtomicUsize::new(0));

    let (p, o, m) = (pool.clone(), outstanding.clone(), max_outstanding.clone());
    hammer_exclusive(6, 5_000, move |id| {
        let slot = p.acquire();
        let now = o.fetch_add(1, SeqCst) + 1;
        m.fetch_max(now, SeqCst);
        assert_eq!(slot.swap(id, SeqCst), 0, "slot {} already owned", slot.index());
        assert_eq!(slot.swap(0, SeqCst), id);
        o.fetch_sub(1, SeqCst);
        true
    });

    assert!(max_outstanding.load(SeqCst) <= CAPACITY);
    assert_eq!(pool.available(), CAPACITY);
}

#[test]
fn lock_free_heavy_contention_settles() {
    #[derive(Default)]
    struct Res {
        value: usize,
    }

    const CAPACITY: usize = 1000;
    const THREADS: usize = 8;
    const ITERATIONS: usize = 500_000;

    let pool = Arc::new(LockFreePool::<Res>::with_capacity(CAPACITY));
    let workers: Vec<_> = (1..=THREADS)
        .map(|t| {
            let pool = pool.clone();
            std::thread::spawn(move || {
                for i in 0..ITERATIONS {
                    if let Some(mut obj) = pool.try_acquire() {
                        obj.value = t * CAPACITY + i;
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(pool.approximate_available(), CAPACITY);
    assert_eq!(pool.in_use(), 0);

    // every slot is still reachable exactly once
    let handles: Vec<_> = (0..CAPACITY).map(|_| pool.try_acquire().unwrap()).collect();
    let mut indices: Vec<_> = handles.iter().map(|h| h.index()).collect();
    indices.sort_unstable();
    indices.dedup();
    assert_eq!(indices.len(), CAPACITY);
    assert!(pool.try_acquire().is_none());
}

#[test]
fn lock_free_owned_handles_settle_across_threads() {
    let pool = Arc::new(LockFreePool::<u64>::with_capacity(2));
    let barrier = Arc::new(Barrier::new(4));
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let pool = pool.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                for i in 0..10_000 {
                    // exhaustion is an expected outcome here
                    if let Some(mut handle) = pool.try_acquire_owned() {
                        *handle = i;
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(pool.approximate_available(), 2);
}
