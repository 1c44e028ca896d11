use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use crate::knowledge::RetrievalResult;

/// Cache key for a similarity retrieval: the query plus the parameters that
/// change what the service returns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetrievalKey {
    query: String,
    top_k: usize,
    threshold_bits: u32,
}

impl RetrievalKey {
    pub fn new(query: &str, top_k: usize, similarity_threshold: f32) -> Self {
        Self {
            query: query.to_string(),
            top_k,
            threshold_bits: similarity_threshold.to_bits(),
        }
    }
}

/// Thread-safe LRU cache for `retrieve_knowledge` responses
///
/// Shared across retrieval sessions so repeated sub-queries skip the remote
/// call. Uses LRU eviction to keep memory bounded.
pub struct RetrievalCache {
    cache: Mutex<LruCache<RetrievalKey, RetrievalResult>>,
}

impl RetrievalCache {
    /// Create a new cache holding at most `capacity` responses (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);

        Self {
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Get a cached response, marking it as recently used
    pub fn get(&self, key: &RetrievalKey) -> Option<RetrievalResult> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    /// Store a response
    pub fn put(&self, key: RetrievalKey, result: RetrievalResult) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, result);
        }
    }

    /// Get the current number of cached entries
    pub fn len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all entries from the cache
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}
