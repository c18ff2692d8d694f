use slot_pool::{Blocking, Builder, Error, LockFree, Pool};

#[test]
fn build_pool() {
    let mut builder = Builder::<usize>::new();
    let pool = builder.capacity(10).build_lock_free();
    assert_eq!(pool.capacity(), 10);
    assert_eq!(pool.available(), 10);
}

#[test]
fn default_capacity() {
    let pool: Pool<u8, Blocking> = Builder::new().build();
    assert_eq!(pool.capacity(), 1024);
}

#[test]
fn build_with_reset_func() {
    let mut builder: Builder<String> = Builder::new();
    fn reset_func(item: &mut String) {
        item.clear();
    }
    builder.reset_func(reset_func);
    builder.capacity(2);
    let pool = builder.build_blocking();
    let item1 = pool.acquire_with(|i| i.push_str("hello"));
    assert_eq!(item1.as_str(), "hello");
    let item2 = pool.acquire_with(|i| i.push_str("world"));
    assert_eq!(item2.as_str(), "world");

    assert_eq!(pool.available(), 0);
    drop(item1);
    assert_eq!(pool.available(), 1);
    let item3 = pool.acquire();
    assert_eq!(item3.as_str(), "");
}

#[test]
fn reset_func_runs_on_explicit_release() {
    let pool = Builder::<Vec<u32>>::new()
        .capacity(1)
        .reset_func(Vec::clear)
        .build_lock_free();
    let item = pool.try_acquire_with(|v| v.extend([1, 2, 3])).unwrap();
    item.release();
    assert!(pool.try_acquire().unwrap().is_empty());
}

#[test]
fn try_build_with_initializer() {
    let pool: Pool<String, LockFree> = Builder::new()
        .capacity(3)
        .try_build_with(|i| Ok::<_, Error>(format!("slot-{i}")))
        .unwrap();
    let first = pool.try_acquire().unwrap();
    assert_eq!(first.as_str(), "slot-0");
}

#[test]
fn try_build_with_failing_initializer() {
    let result: Result<Pool<u8, Blocking>, Error> = Builder::new()
        .capacity(3)
        .try_build_with(|i| if i == 0 { Err("no memory") } else { Ok(1) });
    assert!(matches!(result, Err(Error::Construction { index: 0, .. })));
}

#[test]
fn panicking_reset_func_keeps_the_slot() {
    fn reset_func(item: &mut u32) {
        if *item == 7 {
            panic!("reset failed");
        }
    }
    let pool = Builder::<u32>::new()
        .capacity(2)
        .reset_func(reset_func)
        .build_blocking();
    let item = pool.acquire_with(|i| *i = 7);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| drop(item)));
    assert!(result.is_err());
    assert_eq!(pool.available(), pool.capacity());
    assert_eq!(pool.in_use(), 0);

    let held: Vec<_> = (0..2).map(|_| pool.try_acquire().unwrap()).collect();
    assert_ne!(held[0].index(), held[1].index());
}
