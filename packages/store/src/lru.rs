//! Fixed-capacity least-recently-used cache.
//!
//! Iteration order of the backing [`IndexMap`] is the recency order: the first
//! entry is the least recently used one. A hit through [`LruCache::get`] moves
//! the entry to the end, so this is a strict LRU rather than FIFO.

use indexmap::IndexMap;
use std::hash::Hash;
use tracing::trace;

pub const DEFAULT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct LruCache<K, V> {
    capacity: usize,
    entries: IndexMap<K, V>,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// A capacity of zero is bumped to one
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: IndexMap::new(),
        }
    }

    /// Look up an entry and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let index = self.entries.get_index_of(key)?;
        let last = self.entries.len() - 1;
        self.entries.move_index(index, last);
        self.entries.get_index(last).map(|(_, v)| v)
    }

    /// Look up an entry without touching recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Insert or replace an entry as most recently used.
    ///
    /// Returns the evicted entry when a new key pushed the cache over
    /// capacity.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.entries.shift_remove(&key).is_some() {
            self.entries.insert(key, value);
            return None;
        }

        let evicted = if self.entries.len() >= self.capacity {
            let oldest = self.entries.shift_remove_index(0);
            trace!(capacity = self.capacity, "Evicting least recently used entry");
            oldest
        } else {
            None
        };
        self.entries.insert(key, value);
        evicted
    }

    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.shift_remove(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

impl<K: Hash + Eq + Clone, V> Default for LruCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LruCache::with_capacity(3);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        let evicted = cache.set("d", 4);

        assert_eq!(evicted, Some(("a", 1)));
        assert_eq!(cache.len(), 3);
        assert!(!cache.has(&"a"));
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::with_capacity(3);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        assert_eq!(cache.get(&"a"), Some(&1));
        cache.set("d", 4);

        assert!(cache.has(&"a"));
        assert!(!cache.has(&"b"));
        assert_eq!(cache.keys().copied().collect::<Vec<_>>(), vec!["c", "a", "d"]);
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut cache = LruCache::with_capacity(2);
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.peek(&"a"), Some(&1));
        cache.set("c", 3);
        assert!(!cache.has(&"a"));
    }

    #[test]
    fn test_replacing_existing_key_never_evicts() {
        let mut cache = LruCache::with_capacity(2);
        cache.set("a", 1);
        cache.set("b", 2);

        assert_eq!(cache.set("a", 10), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek(&"a"), Some(&10));

        cache.set("c", 3);
        assert!(!cache.has(&"b"));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cache = LruCache::new();
        cache.set(1, "one");
        cache.set(2, "two");
        assert_eq!(cache.remove(&1), Some("one"));
        assert_eq!(cache.remove(&1), None);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
    }
}
