use std::sync::atomic::Ordering::*;
use std::sync::atomic::{AtomicU32, AtomicU64};

use crossbeam_utils::{Backoff, CachePadded};

use super::FreeList;

/// Link value marking the end of the list.
const NIL: u32 = u32::MAX;

/// A lock-free stack of free indices (Treiber stack over an index arena).
///
/// Every index owns one link word holding the index below it. The head packs
/// the top index together with a tag that is bumped by every successful
/// compare-and-swap. A thread that read head `A` and was preempted while
/// others popped `A` and pushed it back finds a different tag and retries,
/// instead of installing the stale successor it read earlier.
///
/// Link words of in-use indices are left stale; nobody follows them until
/// the index is pushed again and its link rewritten by the sole owner.
#[derive(Debug)]
pub struct LockFree {
    head: CachePadded<AtomicU64>,
    next: Box<[AtomicU32]>,
}

#[inline]
fn pack(index: u32, tag: u32) -> u64 {
    (u64::from(tag) << 32) | u64::from(index)
}

#[inline]
fn unpack(head: u64) -> (u32, u32) {
    (head as u32, (head >> 32) as u32)
}

unsafe impl FreeList for LockFree {
    fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity <= super::MAX_CAPACITY);
        let next = (0..capacity)
            .map(|i| {
                let successor = i + 1;
                AtomicU32::new(if successor < capacity { successor as u32 } else { NIL })
            })
            .collect();
        let top = if capacity == 0 { NIL } else { 0 };
        Self {
            head: CachePadded::new(AtomicU64::new(pack(top, 0))),
            next,
        }
    }

    fn try_pop(&self) -> Option<usize> {
        let backoff = Backoff::new();
        let mut head = self.head.load(Acquire);
        loop {
            let (top, tag) = unpack(head);
            if top == NIL {
                return None;
            }
            // May be stale if `top` was popped meanwhile; the tag check in
            // the CAS below rejects it then.
            let below = self.next[top as usize].load(Relaxed);
            match self.head.compare_exchange_weak(
                head,
                pack(below, tag.wrapping_add(1)),
                AcqRel,
                Acquire,
            ) {
                Ok(_) => return Some(top as usize),
                Err(current) => {
                    head = current;
                    backoff.spin();
                }
            }
        }
    }

    fn push(&self, index: usize) {
        debug_assert!(index < self.next.len(), "index {index} out of range");
        let backoff = Backoff::new();
        let mut head = self.head.load(Relaxed);
        loop {
            let (top, tag) = unpack(head);
            if top == NIL {
                tracing::trace!(index, "refilling an exhausted free list");
            }
            self.next[index].store(top, Relaxed);
            match self.head.compare_exchange_weak(
                head,
                pack(index as u32, tag.wrapping_add(1)),
                Release,
                Relaxed,
            ) {
                Ok(_) => return,
                Err(current) => {
                    head = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Walk the list from the head.
    ///
    /// Links may change under the walk, so the count can be torn. The walk
    /// stops after `capacity` steps even if concurrent updates make it cycle.
    fn len(&self) -> usize {
        let (mut index, _) = unpack(self.head.load(Acquire));
        let mut count = 0;
        while index != NIL && count < self.next.len() {
            count += 1;
            index = self.next[index as usize].load(Relaxed);
        }
        count
    }

    fn is_empty(&self) -> bool {
        unpack(self.head.load(Acquire)).0 == NIL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_keeps_index_and_tag_apart() {
        let head = pack(7, u32::MAX);
        assert_eq!(unpack(head), (7, u32::MAX));
        assert_eq!(unpack(pack(NIL, 0)), (NIL, 0));
    }

    #[test]
    fn pops_in_index_order_then_lifo() {
        let list = LockFree::with_capacity(3);
        assert_eq!(list.len(), 3);
        assert_eq!(list.try_pop(), Some(0));
        assert_eq!(list.try_pop(), Some(1));
        assert_eq!(list.try_pop(), Some(2));
        assert_eq!(list.try_pop(), None);
        list.push(1);
        list.push(2);
        assert_eq!(list.try_pop(), Some(2));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn every_successful_cas_bumps_the_tag() {
        let list = LockFree::with_capacity(2);
        let index = list.try_pop().unwrap();
        list.push(index);
        let (top, tag) = unpack(list.head.load(Relaxed));
        assert_eq!(top, 0);
        assert_eq!(tag, 2);
    }

    #[test]
    fn empty_list() {
        let list = LockFree::with_capacity(0);
        assert!(list.is_empty());
        assert_eq!(list.try_pop(), None);
    }
}
