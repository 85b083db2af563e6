use std::collections::{HashMap, VecDeque};

use crate::assets::store::{ContentKey, PreparedImage};

/// Hit/miss counters of an [`ImageCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImageCacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that missed.
    pub misses: u64,
    /// Entries dropped to respect the capacity.
    pub evictions: u64,
}

/// Bounded least-recently-used cache keyed by image content.
///
/// Holds decoded images by default; the CPU backend reuses it for prepared paints.
pub(crate) struct ImageCache<V = PreparedImage> {
    entries: HashMap<ContentKey, V>,
    lru: VecDeque<ContentKey>,
    capacity: usize,
    stats: ImageCacheStats,
}

impl<V: Clone> ImageCache<V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            lru: VecDeque::new(),
            capacity: capacity.max(1),
            stats: ImageCacheStats::default(),
        }
    }

    pub(crate) fn get(&mut self, key: &ContentKey) -> Option<V> {
        match self.entries.get(key).cloned() {
            Some(img) => {
                self.stats.hits += 1;
                self.touch(*key);
                tracing::debug!(key = key.hash(), "image cache hit");
                Some(img)
            }
            None => {
                self.stats.misses += 1;
                None
            }
        }
    }

    pub(crate) fn contains(&self, key: &ContentKey) -> bool {
        self.entries.contains_key(key)
    }

    pub(crate) fn insert(&mut self, key: ContentKey, value: V) {
        self.entries.insert(key, value);
        self.touch(key);
        while self.lru.len() > self.capacity {
            if let Some(old) = self.lru.pop_front() {
                self.entries.remove(&old);
                self.stats.evictions += 1;
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn stats(&self) -> ImageCacheStats {
        self.stats
    }

    fn touch(&mut self, key: ContentKey) {
        if let Some(pos) = self.lru.iter().position(|k| *k == key) {
            self.lru.remove(pos);
        }
        self.lru.push_back(key);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/assets/cache.rs"]
mod tests;
