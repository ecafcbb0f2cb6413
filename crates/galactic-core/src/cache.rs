//! Bounded key/value cache with least-frequently-used eviction.
//!
//! The engine keys AI decisions by tier and context so that identical
//! situations reuse an earlier answer instead of spending budget.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    access_count: u64,
    inserted: u64,
}

/// LFU cache with hit/miss accounting.
#[derive(Debug)]
pub struct PredictiveCache<K, V> {
    max_size: usize,
    entries: HashMap<K, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    insertions: u64,
}

impl<K, V> PredictiveCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache holding at most `max_size` entries.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            insertions: 0,
        }
    }

    /// Look up a value, counting the access.
    pub fn get(&mut self, key: &K) -> Option<V> {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.access_count = entry.access_count.saturating_add(1);
            self.hits = self.hits.saturating_add(1);
            Some(entry.value.clone())
        } else {
            self.misses = self.misses.saturating_add(1);
            None
        }
    }

    /// Insert or replace a value.
    ///
    /// Inserting a new key into a full cache first evicts the entry with
    /// the lowest access count (oldest first on ties). A stored entry
    /// starts with an access count of 1.
    pub fn set(&mut self, key: K, value: V) {
        if self.max_size == 0 {
            return;
        }
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_least_used();
        }
        self.insertions = self.insertions.saturating_add(1);
        self.entries.insert(
            key,
            CacheEntry {
                value,
                access_count: 1,
                inserted: self.insertions,
            },
        );
    }

    fn evict_least_used(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| (entry.access_count, entry.inserted))
            .map(|(key, _)| key.clone());
        if let Some(key) = victim {
            self.entries.remove(&key);
        }
    }

    /// Fraction of lookups that hit; 0 when nothing was looked up.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let rate = self.hits as f64 / total as f64;
        rate
    }

    /// Total lookups since creation.
    pub const fn lookups(&self) -> u64 {
        self.hits.saturating_add(self.misses)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is stored (does not count as an access).
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }
}
