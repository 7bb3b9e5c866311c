//! Local Cache Storage
//!
//! In-process storage for values owned or fetched by this node.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              ConcurrentCache                  │
//! │   (single mutex, LRU created on first add)    │
//! ├──────────────────────────────────────────────┤
//! │                 LruCache                      │
//! │   recency list + key index, byte budget       │
//! │   charge = key.len() + value.len()            │
//! ├──────────────────────────────────────────────┤
//! │                 ByteView                      │
//! │   immutable, cheaply cloned value bytes       │
//! └──────────────────────────────────────────────┘
//! ```

mod byteview;
mod concurrent;
mod lru;

pub use byteview::ByteView;
pub use concurrent::ConcurrentCache;
pub use self::lru::{LruCache, OnEvicted};

/// Default per-group cache budget (64MB)
pub const DEFAULT_CACHE_BYTES: usize = 64 * 1024 * 1024;

// =============================================================================
// Property Tests
// =============================================================================
