//! Ordered eligibility queue.
//!
//! [`EligibilityQueue`] keeps keyed values sorted by a caller-supplied
//! comparator and answers membership questions in O(1). The liveness registry
//! uses it to rank descriptors by when they become due for respawn.
//!
//! Ordering convention: the front of the queue holds the **minimum** value per
//! the comparator, and [`EligibilityQueue::pop`] removes from the front. Values
//! that compare equal keep their insertion order.

use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::hash::Hash;

type Comparator<V> = Box<dyn Fn(&V, &V) -> Ordering + Send + Sync>;

/// Keyed values in comparator order with an O(1) membership index.
pub struct EligibilityQueue<K, V> {
    /// Entries in ascending comparator order.
    items: VecDeque<(K, V)>,
    /// Keys currently present in `items`.
    members: HashSet<K>,
    compare: Comparator<V>,
}

impl<K, V> EligibilityQueue<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty queue ordered by `compare`.
    #[must_use]
    pub fn new(compare: impl Fn(&V, &V) -> Ordering + Send + Sync + 'static) -> Self {
        Self {
            items: VecDeque::new(),
            members: HashSet::new(),
            compare: Box::new(compare),
        }
    }

    /// Insert `value` under `key`, keeping the queue ordered.
    ///
    /// If `key` is already queued its old entry is removed first and its
    /// value returned. The slot is located by binary search; equal values are
    /// placed after the existing ones.
    pub fn push(&mut self, key: K, value: V) -> Option<V> {
        let previous = self.delete(&key);
        let at = self
            .items
            .partition_point(|(_, existing)| (self.compare)(existing, &value) != Ordering::Greater);
        self.items.insert(at, (key.clone(), value));
        self.members.insert(key);
        previous
    }

    /// Returns `true` if `key` is queued.
    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        self.members.contains(key)
    }

    /// Remove and return the minimum entry.
    pub fn pop(&mut self) -> Option<(K, V)> {
        let (key, value) = self.items.pop_front()?;
        self.members.remove(&key);
        Some((key, value))
    }

    /// Borrow the minimum entry without removing it.
    #[must_use]
    pub fn peek(&self) -> Option<(&K, &V)> {
        self.items.front().map(|(k, v)| (k, v))
    }

    /// Remove an arbitrary entry by key. O(n).
    pub fn delete(&mut self, key: &K) -> Option<V> {
        if !self.members.remove(key) {
            return None;
        }
        let pos = self.items.iter().position(|(k, _)| k == key)?;
        self.items.remove(pos).map(|(_, v)| v)
    }

    /// Borrow the value queued under `key`. O(n).
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        if !self.members.contains(key) {
            return None;
        }
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.items.clear();
        self.members.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate entries in comparator order, minimum first.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.items.iter().map(|(k, v)| (k, v))
    }
}

impl<K, V> fmt::Debug for EligibilityQueue<K, V>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EligibilityQueue")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}
