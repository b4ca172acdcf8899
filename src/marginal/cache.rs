//! Bounded memoization cache
//!
//! Capacity-bounded cache with least-recently-used eviction, backing the
//! aggregation pipeline of a marginal.

use std::hash::Hash;

use indexmap::IndexMap;

/// LRU cache over an insertion-ordered map: the front entry is always the
/// least recently used.
#[derive(Clone, Debug)]
pub struct BoundedCache<K, V> {
    map: IndexMap<K, V>,
    capacity: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: IndexMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Look up a key, refreshing its recency on a hit.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let value = self.map.shift_remove(key)?;
        self.map.insert(key.clone(), value.clone());
        Some(value)
    }

    /// Insert a value, evicting the least recently used entry past
    /// capacity.
    pub fn insert(&mut self, key: K, value: V) {
        self.map.shift_remove(&key);
        self.map.insert(key, value);
        while self.map.len() > self.capacity {
            self.map.shift_remove_index(0);
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop every cached entry.
    pub fn clear(&mut self) {
        self.map.clear();
    }
}
