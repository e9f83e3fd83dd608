//! Size-capped memoization store for expansion results.
//!
//! There is no TTL. When an insert would push the cache past its capacity,
//! the oldest half of the entries (by insertion order) is dropped first.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Default number of memoized expansions.
pub const DEFAULT_CACHE_SIZE: usize = 1024;

/// Cumulative cache counters. Survive `clear()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Insertion-ordered bounded map.
#[derive(Debug)]
pub struct BoundedCache<K, V> {
    max_size: usize,
    entries: HashMap<K, V>,
    order: VecDeque<K>,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> BoundedCache<K, V> {
    /// Create a cache holding at most `max_size` entries (minimum 1).
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        match self.entries.get(key) {
            Some(value) => {
                self.stats.hits += 1;
                Some(value)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    /// Insert or overwrite. Overwriting keeps the entry's original slot.
    pub fn set(&mut self, key: K, value: V) {
        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return;
        }

        if self.entries.len() >= self.max_size {
            self.evict_oldest_half();
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    fn evict_oldest_half(&mut self) {
        let count = (self.entries.len() / 2).max(1);
        for _ in 0..count {
            if let Some(key) = self.order.pop_front() {
                self.entries.remove(&key);
                self.stats.evictions += 1;
            }
        }
    }
}

impl<K: Eq + Hash + Clone, V> Default for BoundedCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}
