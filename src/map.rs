//! An ordered map that allocates one node at a time from a [`NodeAllocator`].

use std::alloc::Layout;
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;

use crate::{AllocError, Heap, NodeAllocator};

type Link<K, V> = Option<NonNull<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    left: Link<K, V>,
    right: Link<K, V>,
}

/// An ordered map stored as a binary search tree of individually allocated
/// nodes.
///
/// The allocator is given for the map's entries and rebound to the
/// internal node type, so a [`PoolAllocator`](crate::PoolAllocator) backed
/// by a [`BlockPool`](crate::BlockPool) sized with
/// [`node_layout`](NodeMap::node_layout) serves every node.
///
/// # Example
///
/// ```rust
/// use slot_pool::{BlockPool, NodeMap, PoolAllocator};
///
/// let pool = BlockPool::new(NodeMap::<u32, &str>::node_layout(), 8).unwrap();
/// let mut map = NodeMap::new_in(PoolAllocator::<(u32, &str)>::new(&pool));
/// map.insert(2, "two").unwrap();
/// map.insert(1, "one").unwrap();
/// assert_eq!(pool.approximate_available(), 6);
/// assert_eq!(map.iter().collect::<Vec<_>>(), [(&1, &"one"), (&2, &"two")]);
/// assert_eq!(map.remove(&1), Some("one"));
/// assert_eq!(pool.approximate_available(), 7);
/// ```
pub struct NodeMap<K, V, A: NodeAllocator<(K, V)> = Heap<(K, V)>> {
    root: Link<K, V>,
    len: usize,
    alloc: A::Rebind<Node<K, V>>,
    _marker: PhantomData<Box<Node<K, V>>>,
}

impl<K, V> NodeMap<K, V> {
    /// Create an empty map on the global allocator.
    pub fn new() -> Self {
        Self::new_in(Heap::new())
    }

    /// Layout of one node, for sizing a [`BlockPool`](crate::BlockPool).
    pub fn node_layout() -> Layout {
        Layout::new::<Node<K, V>>()
    }
}

impl<K, V> Default for NodeMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, A: NodeAllocator<(K, V)>> NodeMap<K, V, A> {
    /// Create an empty map allocating its nodes through `alloc`.
    pub fn new_in(alloc: A) -> Self {
        Self {
            root: None,
            len: 0,
            alloc: alloc.rebind(),
            _marker: PhantomData,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate over the entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter {
            stack: Vec::new(),
            remaining: self.len,
            _marker: PhantomData,
        };
        iter.push_left(self.root);
        iter
    }

    /// Remove every entry, returning all nodes to the allocator.
    pub fn clear(&mut self) {
        let mut pending: Vec<NonNull<Node<K, V>>> = self.root.take().into_iter().collect();
        while let Some(node) = pending.pop() {
            let Node {
                key,
                value,
                left,
                right,
            } = unsafe { node.as_ptr().read() };
            pending.extend(left);
            pending.extend(right);
            unsafe { self.alloc.deallocate(node, 1) };
            drop((key, value));
        }
        self.len = 0;
    }
}

impl<K: Ord, V, A: NodeAllocator<(K, V)>> NodeMap<K, V, A> {
    /// Insert an entry, returning the previous value of `key` if any.
    ///
    /// Fails without touching the map if a new node cannot be allocated.
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>, AllocError> {
        let mut link = &mut self.root;
        while let Some(mut node) = *link {
            let node = unsafe { node.as_mut() };
            match key.cmp(&node.key) {
                Ordering::Less => link = &mut node.left,
                Ordering::Greater => link = &mut node.right,
                Ordering::Equal => return Ok(Some(mem::replace(&mut node.value, value))),
            }
        }
        let node = self.alloc.allocate(1)?;
        unsafe {
            node.as_ptr().write(Node {
                key,
                value,
                left: None,
                right: None,
            })
        };
        *link = Some(node);
        self.len += 1;
        Ok(None)
    }

    /// Get the value stored for `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut cursor = self.root;
        while let Some(node) = cursor {
            let node = unsafe { node.as_ref() };
            match key.cmp(node.key.borrow()) {
                Ordering::Less => cursor = node.left,
                Ordering::Greater => cursor = node.right,
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    /// Get a mutable reference to the value stored for `key`.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut cursor = self.root;
        while let Some(mut node) = cursor {
            let node = unsafe { node.as_mut() };
            match key.cmp(node.key.borrow()) {
                Ordering::Less => cursor = node.left,
                Ordering::Greater => cursor = node.right,
                Ordering::Equal => return Some(&mut node.value),
            }
        }
        None
    }

    /// Whether the map has an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        self.get(key).is_some()
    }

    /// Remove the entry for `key`, returning its value and freeing its node.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Ord + ?Sized,
    {
        let mut link = &mut self.root;
        let target = loop {
            let mut node = (*link)?;
            let entry = unsafe { node.as_mut() };
            match key.cmp(entry.key.borrow()) {
                Ordering::Less => link = &mut entry.left,
                Ordering::Greater => link = &mut entry.right,
                Ordering::Equal => break node,
            }
        };

        let entry = unsafe { &mut *target.as_ptr() };
        *link = match (entry.left, entry.right) {
            (None, right) => right,
            (left, None) => left,
            (Some(_), Some(right)) => {
                let successor = unsafe { detach_min(&mut entry.right, right) };
                let moved = unsafe { &mut *successor.as_ptr() };
                moved.left = entry.left;
                moved.right = entry.right;
                Some(successor)
            }
        };

        let Node { key, value, .. } = unsafe { target.as_ptr().read() };
        unsafe { self.alloc.deallocate(target, 1) };
        self.len -= 1;
        drop(key);
        Some(value)
    }
}

/// Unlink the leftmost node of the subtree `node` hanging off `link`, and
/// return it.
unsafe fn detach_min<K, V>(
    mut link: &mut Link<K, V>,
    mut node: NonNull<Node<K, V>>,
) -> NonNull<Node<K, V>> {
    loop {
        let entry = unsafe { node.as_mut() };
        match entry.left {
            Some(left) => {
                link = &mut entry.left;
                node = left;
            }
            None => {
                *link = entry.right;
                return node;
            }
        }
    }
}

impl<K, V, A: NodeAllocator<(K, V)>> Drop for NodeMap<K, V, A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<K: fmt::Debug, V: fmt::Debug, A: NodeAllocator<(K, V)>> fmt::Debug for NodeMap<K, V, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a, K, V, A: NodeAllocator<(K, V)>> IntoIterator for &'a NodeMap<K, V, A> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// In-order iterator over the entries of a [`NodeMap`].
pub struct Iter<'a, K, V> {
    stack: Vec<NonNull<Node<K, V>>>,
    remaining: usize,
    _marker: PhantomData<&'a Node<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut link: Link<K, V>) {
        while let Some(node) = link {
            self.stack.push(node);
            link = unsafe { node.as_ref() }.left;
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let entry: &'a Node<K, V> = unsafe { node.as_ref() };
        self.push_left(entry.right);
        self.remaining -= 1;
        Some((&entry.key, &entry.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> FusedIterator for Iter<'_, K, V> {}
