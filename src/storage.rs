use std::cell::UnsafeCell;
#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering::*};

/// Fixed array of pooled instances, built once and never resized.
///
/// Which thread may touch a slot is decided by the free list: a slot index
/// popped from the free list belongs to exactly one handle until it is
/// pushed back.
pub(crate) struct Slots<T> {
    slots: Box<[Slot<T>]>,
}

struct Slot<T> {
    value: UnsafeCell<T>,
    /// Liveness tag used to catch double ownership in debug builds.
    #[cfg(debug_assertions)]
    claimed: AtomicBool,
}

// Access to a slot's value is serialized by the free list handoff.
unsafe impl<T: Send> Sync for Slots<T> {}

impl<T> Slots<T> {
    /// Build `capacity` instances in index order.
    ///
    /// Stops at the first failing initializer and reports its index; the
    /// instances built so far are dropped with the partial array.
    pub(crate) fn try_new<E, F>(capacity: usize, mut init: F) -> Result<Self, (usize, E)>
    where
        F: FnMut(usize) -> Result<T, E>,
    {
        let mut slots = Vec::with_capacity(capacity);
        for index in 0..capacity {
            let value = init(index).map_err(|e| (index, e))?;
            slots.push(Slot {
                value: UnsafeCell::new(value),
                #[cfg(debug_assertions)]
                claimed: AtomicBool::new(false),
            });
        }
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// # Safety
    ///
    /// The caller must own `index` (popped from the free list and not yet
    /// released) and hold no mutable reference to it.
    #[inline]
    pub(crate) unsafe fn get(&self, index: usize) -> &T {
        unsafe { &*self.slots[index].value.get() }
    }

    /// # Safety
    ///
    /// The caller must own `index` and hold no other reference to it.
    #[inline]
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn get_mut(&self, index: usize) -> &mut T {
        unsafe { &mut *self.slots[index].value.get() }
    }

    /// Mark `index` as handed out.
    #[inline]
    pub(crate) fn claim(&self, index: usize) {
        #[cfg(debug_assertions)]
        {
            let was_claimed = self.slots[index].claimed.swap(true, AcqRel);
            debug_assert!(!was_claimed, "slot {index} handed out twice");
        }
        #[cfg(not(debug_assertions))]
        let _ = index;
    }

    /// Mark `index` as free again.
    #[inline]
    pub(crate) fn unclaim(&self, index: usize) {
        #[cfg(debug_assertions)]
        {
            let was_claimed = self.slots[index].claimed.swap(false, AcqRel);
            debug_assert!(was_claimed, "slot {index} released while free");
        }
        #[cfg(not(debug_assertions))]
        let _ = index;
    }
}
