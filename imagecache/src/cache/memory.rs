//! In-memory image store with cost-weighted LRU eviction.

use crate::cache::image::CachedImage;
use crate::cache::types::CacheKey;
use crate::cache::CacheStats;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Entry in the memory store.
#[derive(Debug, Clone)]
struct MemoryEntry {
    image: CachedImage,
    cost: u64,
    /// Recency tick of the last put or get
    last_used: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, MemoryEntry>,
    total_cost: u64,
    /// Monotonic counter driving recency
    tick: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Bounded, cost-weighted in-memory store for decoded images.
///
/// The budget is expressed in [`CachedImage::cost`] units (pixel area), not
/// bytes, and there is no entry-count limit. When the aggregate cost exceeds
/// the budget, least recently used entries are evicted. A limit of `0`
/// disables eviction entirely.
///
/// All state sits behind one lock so that a full clear can interleave with
/// puts and gets from other threads.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    cost_limit: u64,
    stats: Mutex<CacheStats>,
}

impl MemoryStore {
    /// Create a store with the given cost budget (0 = unbounded).
    pub fn new(cost_limit: u64) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            cost_limit,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Get a cached image.
    ///
    /// A hit marks the entry as recently used.
    pub fn get(&self, key: &CacheKey) -> Option<CachedImage> {
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();

        match inner.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = tick;
                let image = entry.image.clone();
                drop(inner);
                self.stats.lock().record_memory_hit();
                Some(image)
            }
            None => {
                drop(inner);
                self.stats.lock().record_memory_miss();
                None
            }
        }
    }

    /// Insert or replace an image.
    ///
    /// The new entry is never the one evicted; if it alone exceeds the
    /// budget, every other entry is dropped and it is kept.
    pub fn put(&self, key: CacheKey, image: CachedImage) {
        let cost = image.cost();
        let mut inner = self.inner.lock();
        let tick = inner.next_tick();

        let entry = MemoryEntry {
            image,
            cost,
            last_used: tick,
        };
        if let Some(previous) = inner.entries.insert(key.clone(), entry) {
            inner.total_cost = inner.total_cost.saturating_sub(previous.cost);
        }
        inner.total_cost += cost;

        let evicted = self.evict_over_budget(&mut inner, &key);

        let (total_cost, count) = (inner.total_cost, inner.entries.len());
        drop(inner);

        let mut stats = self.stats.lock();
        if evicted > 0 {
            stats.record_memory_eviction(evicted);
        }
        stats.update_memory_size(total_cost, count);
    }

    /// Evict least recently used entries, sparing `keep`, until the total
    /// cost fits the budget. Returns the number of entries evicted.
    fn evict_over_budget(&self, inner: &mut Inner, keep: &CacheKey) -> u64 {
        if self.cost_limit == 0 || inner.total_cost <= self.cost_limit {
            return 0;
        }

        let mut candidates: Vec<(u64, CacheKey)> = inner
            .entries
            .iter()
            .filter(|(key, _)| *key != keep)
            .map(|(key, entry)| (entry.last_used, key.clone()))
            .collect();
        candidates.sort_unstable_by_key(|(last_used, _)| *last_used);

        let mut evicted = 0;
        for (_, key) in candidates {
            if inner.total_cost <= self.cost_limit {
                break;
            }
            if let Some(entry) = inner.entries.remove(&key) {
                inner.total_cost = inner.total_cost.saturating_sub(entry.cost);
                evicted += 1;
                tracing::trace!(key = %key, cost = entry.cost, "Evicted image from memory");
            }
        }
        evicted
    }

    /// Drop every entry. Returns how many entries were dropped.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let dropped = inner.entries.len();
        inner.entries.clear();
        inner.total_cost = 0;
        drop(inner);

        let mut stats = self.stats.lock();
        stats.record_memory_clear();
        stats.update_memory_size(0, 0);
        dropped
    }

    /// Note that the last clear was triggered by memory pressure.
    pub fn record_pressure_clear(&self) {
        self.stats.lock().record_memory_pressure_clear();
    }

    /// Check if a key is resident, without touching recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Number of resident entries.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Aggregate cost of resident entries.
    pub fn total_cost(&self) -> u64 {
        self.inner.lock().total_cost
    }

    /// Configured cost budget (0 = unbounded).
    pub fn cost_limit(&self) -> u64 {
        self.cost_limit
    }

    /// Snapshot of memory statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.lock().clone()
    }
}
