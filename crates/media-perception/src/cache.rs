//! Bounded analysis cache with LRU eviction
//!
//! Results are memoized by a SHA-256 hash of the input bytes. The cache is
//! an explicit object injected into the engine rather than module-level
//! state, with a documented capacity and eviction policy.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::models::{MediaAnalysis, MediaType};

pub const DEFAULT_CACHE_CAPACITY: usize = 1000;

/// Mutex-guarded LRU cache over completed analyses.
pub struct AnalysisCache {
    entries: Mutex<LruCache<String, Arc<MediaAnalysis>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl AnalysisCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache key: media type prefix + SHA-256 of the raw input bytes.
    pub fn key_for(media_type: MediaType, bytes: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        format!("{}:{:x}", media_type.name(), hasher.finalize())
    }

    /// O(1) lookup; a hit promotes the entry and increments the hit counter.
    pub fn get(&self, key: &str) -> Option<Arc<MediaAnalysis>> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(analysis) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(analysis))
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Insert an analysis, evicting the least-recently-used entry when the
    /// cache is at capacity.
    pub fn insert(&self, key: String, analysis: Arc<MediaAnalysis>) {
        self.entries.lock().put(key, analysis);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl Default for AnalysisCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;

    fn sample_analysis() -> Arc<MediaAnalysis> {
        Arc::new(MediaAnalysis::empty(MediaType::Screenshot))
    }

    #[test]
    fn hit_counter_increments_on_repeat_lookup() {
        let cache = AnalysisCache::new(10);
        let key = AnalysisCache::key_for(MediaType::Screenshot, b"frame-bytes");

        assert!(cache.get(&key).is_none());
        assert_eq!(cache.miss_count(), 1);

        cache.insert(key.clone(), sample_analysis());
        assert!(cache.get(&key).is_some());
        assert!(cache.get(&key).is_some());
        assert_eq!(cache.hit_count(), 2);
    }

    #[test]
    fn evicts_least_recently_used_at_capacity() {
        let cache = AnalysisCache::new(2);
        cache.insert("a".into(), sample_analysis());
        cache.insert("b".into(), sample_analysis());

        // Touch "a" so "b" becomes the eviction candidate.
        assert!(cache.get("a").is_some());
        cache.insert("c".into(), sample_analysis());

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert!(cache.get("b").is_none());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn key_is_stable_for_identical_bytes() {
        let k1 = AnalysisCache::key_for(MediaType::Image, b"same");
        let k2 = AnalysisCache::key_for(MediaType::Image, b"same");
        let k3 = AnalysisCache::key_for(MediaType::Screenshot, b"same");
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
    }
}
