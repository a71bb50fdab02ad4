//! Resident bitmap storage with focus-aware eviction

use std::sync::Arc;

use log::debug;
use lru::LruCache;

use super::key::{CacheKey, Focus};
use crate::deck::{Rasterization, Resolution};

/// Bitmaps currently held in memory.
///
/// Bounded by entry count, not bytes. When over budget the entry farthest
/// from the focus page goes first, least recently used among equals.
/// Protected entries are skipped, so the set may stay over budget when
/// everything left is protected.
pub struct ResidentSet {
    entries: LruCache<CacheKey, Arc<Rasterization>>,
    max_resident: usize,
}

impl ResidentSet {
    #[must_use]
    pub fn new(max_resident: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            max_resident: max_resident.max(1),
        }
    }

    /// Get a resident bitmap, promoting it in the LRU order
    #[must_use]
    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<Rasterization>> {
        self.entries.get(key).cloned()
    }

    /// Check residency without promoting
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains(key)
    }

    /// Store a bitmap, replacing any previous one for the same key, then
    /// enforce the budget. Returns the stored bitmap and the evicted keys.
    pub fn insert(
        &mut self,
        key: CacheKey,
        raster: Rasterization,
        focus: &Focus,
    ) -> (Arc<Rasterization>, Vec<CacheKey>) {
        let arc = Arc::new(raster);
        self.entries.put(key, Arc::clone(&arc));
        let evicted = self.enforce_budget(focus);
        (arc, evicted)
    }

    /// Evict until within budget or only protected entries remain
    pub fn enforce_budget(&mut self, focus: &Focus) -> Vec<CacheKey> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.max_resident {
            let Some(victim) = self.pick_victim(focus) else {
                debug!(
                    "Cache over budget ({} > {}) but every entry is protected",
                    self.entries.len(),
                    self.max_resident
                );
                break;
            };
            self.entries.pop(&victim);
            evicted.push(victim);
        }
        evicted
    }

    fn pick_victim(&self, focus: &Focus) -> Option<CacheKey> {
        let mut victim: Option<(usize, CacheKey)> = None;
        // Least recently used first so it wins ties.
        for (key, _) in self.entries.iter().rev() {
            if focus.protects(key) {
                continue;
            }
            let distance = focus.distance(key.page);
            if victim.is_none_or(|(best, _)| distance > best) {
                victim = Some((distance, *key));
            }
        }
        victim.map(|(_, key)| key)
    }

    /// Drop every entry at the given resolution
    pub fn invalidate_resolution(&mut self, resolution: Resolution) -> usize {
        let keys: Vec<_> = self
            .entries
            .iter()
            .filter(|(k, _)| k.resolution == resolution)
            .map(|(k, _)| *k)
            .collect();

        for key in &keys {
            self.entries.pop(key);
        }
        keys.len()
    }

    /// Keys currently resident, most recently used first
    #[must_use]
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|(k, _)| *k).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
