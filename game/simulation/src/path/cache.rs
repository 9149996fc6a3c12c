use std::collections::VecDeque;

use ahash::AHashMap;

use crate::path::astar::Cell;
use crate::time::Tick;

#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct CacheKey {
    pub start: Cell,
    pub goal: Cell,
    pub grid_version: u64,
}

struct Entry {
    key: CacheKey,
    path: Vec<Cell>,
    inserted_tick: Tick,
}

/// Small LRU cache of completed paths, keyed by `(start, goal, grid_version)` (§4.5). Entries are
/// considered stale after roughly one simulated second, matching the spec's cache lifetime, and
/// are implicitly invalidated whenever `grid_version` changes since that's baked into the key.
pub struct PathCache {
    capacity: usize,
    ttl_ticks: u64,
    order: VecDeque<CacheKey>,
    entries: AHashMap<CacheKey, Entry>,
}

impl Default for PathCache {
    fn default() -> Self {
        let cfg = config::get();
        Self::new(cfg.pathfinder.cache_capacity, crate::time::TICKS_PER_SECOND as u64)
    }
}

impl PathCache {
    pub fn new(capacity: usize, ttl_ticks: u64) -> Self {
        Self {
            capacity,
            ttl_ticks,
            order: VecDeque::with_capacity(capacity),
            entries: AHashMap::default(),
        }
    }

    pub fn get(&mut self, key: &CacheKey, now: Tick) -> Option<Vec<Cell>> {
        let expired = match self.entries.get(key) {
            Some(entry) => now.value().saturating_sub(entry.inserted_tick.value()) > self.ttl_ticks,
            None => return None,
        };

        if expired {
            self.entries.remove(key);
            self.order.retain(|k| k != key);
            return None;
        }

        // move to back (most-recently-used)
        self.order.retain(|k| k != key);
        self.order.push_back(*key);
        self.entries.get(key).map(|e| e.path.clone())
    }

    pub fn insert(&mut self, key: CacheKey, path: Vec<Cell>, now: Tick) {
        if self.entries.contains_key(&key) {
            self.order.retain(|k| k != &key);
        } else if self.entries.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }

        self.order.push_back(key);
        self.entries.insert(
            key,
            Entry {
                key,
                path,
                inserted_tick: now,
            },
        );
    }

    /// Drops every entry whose key doesn't match `grid_version`; called when passability changes
    /// even though the version is already part of the key, to bound memory (§4.12).
    pub fn invalidate_stale_versions(&mut self, grid_version: u64) {
        let stale: Vec<CacheKey> = self
            .entries
            .values()
            .filter(|e| e.key.grid_version != grid_version)
            .map(|e| e.key)
            .collect();
        for key in stale {
            self.entries.remove(&key);
            self.order.retain(|k| k != &key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: Cell, g: Cell, v: u64) -> CacheKey {
        CacheKey {
            start: s,
            goal: g,
            grid_version: v,
        }
    }

    #[test]
    fn insert_then_get_returns_same_path() {
        let mut cache = PathCache::new(4, 60);
        let k = key((0, 0), (5, 5), 0);
        cache.insert(k, vec![(0, 0), (5, 5)], Tick::default());
        assert_eq!(
            cache.get(&k, Tick::default()),
            Some(vec![(0, 0), (5, 5)])
        );
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let mut cache = PathCache::new(2, 1000);
        cache.insert(key((0, 0), (1, 1), 0), vec![], Tick::default());
        cache.insert(key((0, 0), (2, 2), 0), vec![], Tick::default());
        // touch first entry so it's most-recently-used
        cache.get(&key((0, 0), (1, 1), 0), Tick::default());
        cache.insert(key((0, 0), (3, 3), 0), vec![], Tick::default());

        assert!(cache.get(&key((0, 0), (1, 1), 0), Tick::default()).is_some());
        assert!(cache.get(&key((0, 0), (2, 2), 0), Tick::default()).is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn grid_version_bump_is_a_different_key() {
        let mut cache = PathCache::new(4, 1000);
        cache.insert(key((0, 0), (1, 1), 0), vec![(0, 0)], Tick::default());
        assert!(cache.get(&key((0, 0), (1, 1), 1), Tick::default()).is_none());
    }
}
