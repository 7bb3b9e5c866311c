//! Byte-budgeted LRU cache
//!
//! Entries are charged `key.len() + value.len()` bytes against a fixed
//! budget. Inserting past the budget evicts least-recently-used entries
//! until the cache fits again.
//!
//! # Design
//!
//! - Recency order and key lookup come from [`lru::LruCache`] in unbounded
//!   mode; this type only does the byte accounting and eviction
//! - A budget of 0 disables eviction
//! - Not thread-safe; see [`super::ConcurrentCache`]

use std::sync::Arc;

use super::byteview::ByteView;

/// Callback invoked with every entry that leaves the cache
pub type OnEvicted = Arc<dyn Fn(&str, &ByteView) + Send + Sync>;

/// LRU cache bounded by total key + value bytes
pub struct LruCache {
    /// Budget in bytes (0 = unbounded)
    max_bytes: usize,
    /// Bytes charged by resident entries
    used_bytes: usize,
    /// Most recently used at the front
    entries: lru::LruCache<String, ByteView>,
    /// Eviction hook
    on_evicted: Option<OnEvicted>,
}

impl LruCache {
    /// Create a cache with the given byte budget
    pub fn new(max_bytes: usize, on_evicted: Option<OnEvicted>) -> Self {
        Self {
            max_bytes,
            used_bytes: 0,
            entries: lru::LruCache::unbounded(),
            on_evicted,
        }
    }

    /// Create a cache that never evicts
    pub fn unbounded() -> Self {
        Self::new(0, None)
    }

    /// Look up a key, marking it most recently used
    pub fn get(&mut self, key: &str) -> Option<ByteView> {
        self.entries.get(key).cloned()
    }

    /// Look up a key without touching recency
    pub fn peek(&self, key: &str) -> Option<ByteView> {
        self.entries.peek(key).cloned()
    }

    /// Check if a key is resident
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Insert or update an entry, then evict until within budget
    pub fn add(&mut self, key: impl Into<String>, value: ByteView) {
        let key = key.into();
        let key_len = key.len();
        let value_len = value.len();

        match self.entries.put(key, value) {
            // Update keeps the entry; only the value size changes
            Some(old) => {
                self.used_bytes = self.used_bytes + value_len - old.len();
            }
            None => {
                self.used_bytes += key_len + value_len;
            }
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Remove the least recently used entry
    pub fn remove_oldest(&mut self) -> Option<(String, ByteView)> {
        let (key, value) = self.entries.pop_lru()?;
        self.release(&key, &value);
        Some((key, value))
    }

    /// Remove a specific entry
    pub fn remove(&mut self, key: &str) -> Option<ByteView> {
        let (key, value) = self.entries.pop_entry(key)?;
        self.release(&key, &value);
        Some(value)
    }

    /// Remove every entry, oldest first
    pub fn clear(&mut self) {
        while self.remove_oldest().is_some() {}
    }

    fn release(&mut self, key: &str, value: &ByteView) {
        self.used_bytes -= key.len() + value.len();
        if let Some(on_evicted) = &self.on_evicted {
            on_evicted(key, value);
        }
    }

    /// Number of resident entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Bytes charged by resident entries
    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Byte budget (0 = unbounded)
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Keys from most to least recently used
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|(k, _)| k.clone()).collect()
    }
}

impl std::fmt::Debug for LruCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("used_bytes", &self.used_bytes)
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
