//! Cache Groups
//!
//! A [`Group`] is a named cache namespace. It ties together the local cache,
//! the user's backend [`Getter`], an optional [`PeerPicker`] and an in-flight
//! deduplicator.
//!
//! # Lookup Flow
//!
//! ```text
//! get(key)
//!   ├─ empty key ─────────────────────────────▶ Error::EmptyKey
//!   ├─ local cache hit ───────────────────────▶ ByteView
//!   └─ miss ─▶ singleflight(key)
//!                ├─ peer owns key ─▶ PeerGetter::fetch ──┐
//!                │       (on failure fall through)       │
//!                └─ local ─────────▶ Getter::get ────────┤
//!                                                        ▼
//!                                           populate cache, return
//! ```
//!
//! Each group owns its own deduplicator, so equal raw keys in different
//! groups are never coalesced.

pub mod registry;
pub mod stats;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{ByteView, ConcurrentCache, OnEvicted, DEFAULT_CACHE_BYTES};
use crate::error::{Error, Result};
use crate::peers::{PeerGetter, PeerPicker};
use crate::singleflight::SingleFlight;

pub use registry::{get_group, new_group, Registry};
pub use stats::{GroupStats, StatsSnapshot};

/// Backend fetch invoked on a local cache miss.
///
/// Any `Fn(String) -> impl Future<Output = Result<Vec<u8>>>` closure is a
/// `Getter`:
///
/// ```
/// use peercache::{Error, Registry};
///
/// let registry = Registry::new();
/// let group = registry.new_group("scores", 1 << 20, |key: String| async move {
///     match key.as_str() {
///         "Tom" => Ok(b"630".to_vec()),
///         _ => Err(Error::backend(format!("{} not exist", key))),
///     }
/// });
/// assert_eq!(group.name(), "scores");
/// ```
#[async_trait]
pub trait Getter: Send + Sync {
    /// Produce the value for `key`
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

#[async_trait]
impl<F, Fut> Getter for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>>> + Send + 'static,
{
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self(key.to_string()).await
    }
}

/// Group configuration
#[derive(Debug, Clone)]
pub struct GroupConfig {
    /// Local cache budget in bytes (0 = unbounded)
    pub cache_bytes: usize,
    /// Upper bound on a single fetch; shared by every caller waiting on it
    pub load_timeout: Option<Duration>,
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            cache_bytes: DEFAULT_CACHE_BYTES,
            load_timeout: None,
        }
    }
}

/// Named cache namespace
pub struct Group {
    name: String,
    getter: Arc<dyn Getter>,
    main_cache: ConcurrentCache,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    loader: SingleFlight<ByteView>,
    config: GroupConfig,
    stats: Arc<GroupStats>,
}

impl Group {
    pub(crate) fn new(name: String, config: GroupConfig, getter: Arc<dyn Getter>) -> Self {
        let stats = Arc::new(GroupStats::new());
        let evictions = Arc::clone(&stats);
        let on_evicted: OnEvicted = Arc::new(move |_key: &str, _value: &ByteView| {
            evictions.record_eviction();
        });

        Self {
            name,
            getter,
            main_cache: ConcurrentCache::with_eviction_callback(config.cache_bytes, Some(on_evicted)),
            peers: OnceCell::new(),
            loader: SingleFlight::new(),
            config,
            stats,
        }
    }

    /// Group name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Group configuration
    pub fn config(&self) -> &GroupConfig {
        &self.config
    }

    /// Attach the peer picker used to route misses; allowed once
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers.set(peers).map_err(|_| {
            Error::Config(format!(
                "peers already registered for group {}",
                self.name
            ))
        })
    }

    /// Look up `key`, loading it on a miss
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.get_with_cancel(key, &CancellationToken::new()).await
    }

    /// Look up `key`, giving up with [`Error::Cancelled`] once `cancel` fires
    pub async fn get_with_cancel(&self, key: &str, cancel: &CancellationToken) -> Result<ByteView> {
        self.stats.record_get();
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        if let Some(value) = self.main_cache.get(key) {
            self.stats.record_cache_hit();
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        debug!(group = %self.name, key, "cache miss");
        self.load(key, cancel).await
    }

    async fn load(&self, key: &str, cancel: &CancellationToken) -> Result<ByteView> {
        self.stats.record_load();
        self.loader
            .call_with_cancel(key, cancel, || async {
                self.stats.record_fetch();
                let value = match self.config.load_timeout {
                    Some(timeout) => tokio::time::timeout(timeout, self.fetch(key))
                        .await
                        .map_err(|_| Error::Timeout {
                            key: key.to_string(),
                            timeout,
                        })??,
                    None => self.fetch(key).await?,
                };
                self.populate_cache(key, value.clone());
                Ok(value)
            })
            .await
    }

    async fn fetch(&self, key: &str) -> Result<ByteView> {
        if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
            match self.get_from_peer(peer.as_ref(), key).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    self.stats.record_peer_error();
                    warn!(
                        group = %self.name,
                        key,
                        peer = peer.peer_id(),
                        error = %err,
                        "peer fetch failed, falling back to local getter"
                    );
                }
            }
        }

        self.get_locally(key).await
    }

    async fn get_from_peer(&self, peer: &dyn PeerGetter, key: &str) -> Result<ByteView> {
        let bytes = peer.fetch(&self.name, key).await?;
        self.stats.record_peer_load();
        Ok(ByteView::from(bytes))
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView> {
        match self.getter.get(key).await {
            Ok(bytes) => {
                self.stats.record_local_load();
                Ok(ByteView::from(bytes))
            }
            Err(err) => {
                self.stats.record_local_load_error();
                Err(err)
            }
        }
    }

    fn populate_cache(&self, key: &str, value: ByteView) {
        self.main_cache.add(key, value);
    }

    /// Snapshot of this group's counters
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn record_server_request(&self) {
        self.stats.record_server_request();
    }

    /// Number of entries in the local cache
    pub fn cache_len(&self) -> usize {
        self.main_cache.len()
    }

    /// Bytes charged by the local cache
    pub fn cache_bytes(&self) -> usize {
        self.main_cache.used_bytes()
    }
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("cache", &self.main_cache)
            .field("has_peers", &self.peers.get().is_some())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
