//! Group Statistics
//!
//! Lock-free counters describing how a group's lookups were served.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Per-group counters
#[derive(Debug, Default)]
pub struct GroupStats {
    /// Every `get` call, including invalid keys
    gets: AtomicU64,
    /// Lookups served from the local cache
    cache_hits: AtomicU64,
    /// Lookups that missed the cache and went through the loader
    loads: AtomicU64,
    /// Loads that actually ran a fetch (the rest waited on one)
    fetches: AtomicU64,
    /// Values fetched from a remote peer
    peer_loads: AtomicU64,
    /// Remote fetches that failed and fell back to the local getter
    peer_errors: AtomicU64,
    /// Values produced by the local getter
    local_loads: AtomicU64,
    /// Local getter failures
    local_load_errors: AtomicU64,
    /// Requests received from peers over the transport
    server_requests: AtomicU64,
    /// Entries evicted from the local cache
    evictions: AtomicU64,
}

impl GroupStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_error(&self) {
        self.local_load_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Cache hit ratio over all lookups (0.0 - 1.0)
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets.load(Ordering::Relaxed) as f64;
        if gets == 0.0 {
            0.0
        } else {
            self.cache_hits.load(Ordering::Relaxed) as f64 / gets
        }
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            peer_loads: self.peer_loads.load(Ordering::Relaxed),
            peer_errors: self.peer_errors.load(Ordering::Relaxed),
            local_loads: self.local_loads.load(Ordering::Relaxed),
            local_load_errors: self.local_load_errors.load(Ordering::Relaxed),
            server_requests: self.server_requests.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            hit_ratio: self.hit_ratio(),
        }
    }
}

/// Snapshot of [`GroupStats`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub cache_hits: u64,
    pub loads: u64,
    pub fetches: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub local_loads: u64,
    pub local_load_errors: u64,
    pub server_requests: u64,
    pub evictions: u64,
    pub hit_ratio: f64,
}

// =============================================================================
// Tests
// =============================================================================
