//! Thread-safe cache façade
//!
//! Wraps an [`LruCache`] behind a single mutex. The LRU itself is only
//! allocated on the first write, so an idle wrapper costs nothing.

use parking_lot::Mutex;

use super::byteview::ByteView;
use super::lru::{LruCache, OnEvicted};

/// Mutex-guarded, lazily created LRU cache
pub struct ConcurrentCache {
    /// Budget handed to the LRU when it is created
    cache_bytes: usize,
    /// Eviction hook handed to the LRU when it is created
    on_evicted: Option<OnEvicted>,
    /// `None` until the first `add`
    lru: Mutex<Option<LruCache>>,
}

impl ConcurrentCache {
    /// Create an empty wrapper with the given byte budget
    pub fn new(cache_bytes: usize) -> Self {
        Self::with_eviction_callback(cache_bytes, None)
    }

    /// Create an empty wrapper whose LRU will report evictions
    pub fn with_eviction_callback(cache_bytes: usize, on_evicted: Option<OnEvicted>) -> Self {
        Self {
            cache_bytes,
            on_evicted,
            lru: Mutex::new(None),
        }
    }

    /// Look up a key; always a miss before the first `add`
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let mut guard = self.lru.lock();
        guard.as_mut()?.get(key)
    }

    /// Insert a value, creating the LRU on first use
    pub fn add(&self, key: impl Into<String>, value: ByteView) {
        let mut guard = self.lru.lock();
        guard
            .get_or_insert_with(|| LruCache::new(self.cache_bytes, self.on_evicted.clone()))
            .add(key, value);
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, LruCache::len)
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes charged by resident entries
    pub fn used_bytes(&self) -> usize {
        self.lru.lock().as_ref().map_or(0, LruCache::used_bytes)
    }

    /// Configured byte budget
    pub fn capacity(&self) -> usize {
        self.cache_bytes
    }

    /// Whether the underlying LRU has been allocated
    pub fn is_initialized(&self) -> bool {
        self.lru.lock().is_some()
    }
}

impl std::fmt::Debug for ConcurrentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentCache")
            .field("cache_bytes", &self.cache_bytes)
            .field("lru", &*self.lru.lock())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
