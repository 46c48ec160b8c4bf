//! Working cache of hot records
//!
//! TigerStyle: Bounded in-process map with an explicit capacity discipline.
//!
//! The cache is a coherent subset of the vector store, never an overlay: a
//! record present here is present there with equal metadata. The manager
//! mutates the cache inside the same per-id critical section as the store,
//! so readers observe either the pre-image in both or the post-image in
//! both.

use crate::types::{MemoryId, MemoryRecord};
use mnemo_core::constants::WORKING_CACHE_CAPACITY_DEFAULT;
use std::collections::HashMap;

/// Bounded map of hot records keyed by id
#[derive(Debug)]
pub struct WorkingCache {
    capacity: usize,
    entries: HashMap<MemoryId, MemoryRecord>,
}

impl WorkingCache {
    /// Create an empty cache with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(WORKING_CACHE_CAPACITY_DEFAULT)
    }

    /// Create an empty cache with an explicit capacity
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "cache capacity must be positive");
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Populate from a startup listing
    ///
    /// Records are ranked by access frequency over their idle time,
    /// `access_count / (now - last_accessed)`, descending; the top
    /// `capacity` are kept. Records without an embedding are admitted; the
    /// cache mirrors metadata, not vectors.
    pub fn warm(&mut self, records: Vec<MemoryRecord>, now: i64) {
        let mut ranked = records;
        ranked.sort_by(|a, b| {
            Self::heat(b, now)
                .partial_cmp(&Self::heat(a, now))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(self.capacity);

        self.entries.clear();
        for record in ranked {
            self.entries.insert(record.id, record);
        }
    }

    fn heat(record: &MemoryRecord, now: i64) -> f64 {
        let idle_ms = (now - record.last_accessed).max(1) as f64;
        record.access_count as f64 / idle_ms
    }

    /// Insert or replace a record, evicting the coldest entry at capacity
    pub fn insert(&mut self, record: MemoryRecord) {
        if !self.entries.contains_key(&record.id) && self.entries.len() >= self.capacity {
            if let Some(coldest) = self
                .entries
                .values()
                .min_by_key(|r| r.last_accessed)
                .map(|r| r.id)
            {
                self.entries.remove(&coldest);
            }
        }
        self.entries.insert(record.id, record);
    }

    /// Replace a record only if it is already cached
    pub fn update(&mut self, record: &MemoryRecord) {
        if let Some(existing) = self.entries.get_mut(&record.id) {
            *existing = record.clone();
        }
    }

    /// Fetch a cached record
    pub fn get(&self, id: &MemoryId) -> Option<&MemoryRecord> {
        self.entries.get(id)
    }

    /// Remove a record
    pub fn remove(&mut self, id: &MemoryId) -> bool {
        self.entries.remove(id).is_some()
    }

    pub fn contains(&self, id: &MemoryId) -> bool {
        self.entries.contains_key(id)
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
}

impl Default for WorkingCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{now_ms, MemoryLayer, MemorySource};

    fn record(content: &str) -> MemoryRecord {
        MemoryRecord::new(
            content,
            0.5,
            MemorySource::Agent,
            vec![],
            MemoryLayer::Working,
        )
    }

    #[test]
    fn test_insert_and_get() {
        let mut cache = WorkingCache::new();
        let r = record("hot");
        cache.insert(r.clone());

        assert!(cache.contains(&r.id));
        assert_eq!(cache.get(&r.id).unwrap().content, "hot");
    }

    #[test]
    fn test_update_only_touches_cached_entries() {
        let mut cache = WorkingCache::new();
        let cached = record("cached");
        cache.insert(cached.clone());

        let mut changed = cached.clone();
        changed.access_count = 9;
        cache.update(&changed);
        assert_eq!(cache.get(&cached.id).unwrap().access_count, 9);

        let stranger = record("not cached");
        cache.update(&stranger);
        assert!(!cache.contains(&stranger.id));
    }

    #[test]
    fn test_warm_keeps_hottest_records() {
        let now = now_ms();
        let mut cache = WorkingCache::with_capacity(2);

        let mut hot = record("hot");
        hot.access_count = 100;
        hot.last_accessed = now - 1_000;

        let mut warm = record("warm");
        warm.access_count = 10;
        warm.last_accessed = now - 1_000;

        let mut cold = record("cold");
        cold.access_count = 1;
        cold.last_accessed = now - 86_400_000;

        cache.warm(vec![cold.clone(), hot.clone(), warm.clone()], now);

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&hot.id));
        assert!(cache.contains(&warm.id));
        assert!(!cache.contains(&cold.id));
    }

    #[test]
    fn test_insert_evicts_coldest_at_capacity() {
        let now = now_ms();
        let mut cache = WorkingCache::with_capacity(2);

        let mut old = record("old");
        old.last_accessed = now - 10_000;
        let mut newer = record("newer");
        newer.last_accessed = now - 1_000;
        cache.insert(old.clone());
        cache.insert(newer.clone());

        let fresh = record("fresh");
        cache.insert(fresh.clone());

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains(&old.id));
        assert!(cache.contains(&newer.id));
        assert!(cache.contains(&fresh.id));
    }

    #[test]
    fn test_reinsert_does_not_evict() {
        let mut cache = WorkingCache::with_capacity(2);
        let a = record("a");
        let b = record("b");
        cache.insert(a.clone());
        cache.insert(b.clone());

        cache.insert(a.clone());
        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&b.id));
    }

    #[test]
    fn test_remove() {
        let mut cache = WorkingCache::new();
        let r = record("bye");
        cache.insert(r.clone());

        assert!(cache.remove(&r.id));
        assert!(!cache.remove(&r.id));
        assert!(cache.is_empty());
    }
}
