use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::FreeList;

/// A mutex guarded stack of free indices with a condition variable for
/// waiting acquirers.
///
/// Each push wakes at most one waiter, since one released slot lets exactly
/// one waiter make progress.
#[derive(Debug)]
pub struct Blocking {
    stack: Mutex<Vec<usize>>,
    available: Condvar,
}

impl Blocking {
    /// Pop an index, waiting for a push while the stack is empty.
    pub fn pop_wait(&self) -> usize {
        let mut stack = self.stack.lock();
        loop {
            // Re-check after every wakeup: another acquirer may have taken
            // the slot first, or the wakeup may be spurious.
            if let Some(index) = stack.pop() {
                return index;
            }
            tracing::trace!("free list empty, waiting for a release");
            self.available.wait(&mut stack);
        }
    }

    /// Pop an index, waiting for a push until `deadline`. Return `None` if
    /// the deadline passes with the stack still empty.
    pub fn pop_wait_until(&self, deadline: Instant) -> Option<usize> {
        let mut stack = self.stack.lock();
        loop {
            if let Some(index) = stack.pop() {
                return Some(index);
            }
            if self.available.wait_until(&mut stack, deadline).timed_out() {
                tracing::trace!("timed out waiting for a release");
                return stack.pop();
            }
        }
    }

    /// Pop an index, waiting for a push at most `timeout`. A timeout too
    /// large to express as a deadline waits without bound.
    pub fn pop_wait_for(&self, timeout: Duration) -> Option<usize> {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.pop_wait_until(deadline),
            None => Some(self.pop_wait()),
        }
    }
}

unsafe impl FreeList for Blocking {
    fn with_capacity(capacity: usize) -> Self {
        debug_assert!(capacity <= super::MAX_CAPACITY);
        // Reversed so index 0 sits on top.
        Self {
            stack: Mutex::new((0..capacity).rev().collect()),
            available: Condvar::new(),
        }
    }

    fn try_pop(&self) -> Option<usize> {
        self.stack.lock().pop()
    }

    fn push(&self, index: usize) {
        let mut stack = self.stack.lock();
        stack.push(index);
        self.available.notify_one();
    }

    fn len(&self) -> usize {
        self.stack.lock().len()
    }
}
