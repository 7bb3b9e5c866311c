//! PeerCache - Distributed Look-Aside Cache
//!
//! An in-process, byte-budgeted LRU cache that cooperates with peer nodes.
//! Each key is owned by exactly one node (chosen on a consistent hash ring);
//! misses are fetched from the owner or, when this node owns the key, from a
//! user-supplied backend. Concurrent misses for the same key are collapsed
//! into one fetch.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                            Group                             │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │ Concurrent   │   │ SingleFlight │   │   PeerPicker     │  │
//! │  │ Cache (LRU)  │   │ (dedup)      │   │ (HashRing + HTTP)│  │
//! │  └──────────────┘   └──────────────┘   └──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//!                                │ local owner
//!                                ▼
//!                        Getter (backend)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use peercache::{HttpPool, Registry};
//!
//! # async fn run() -> peercache::Result<()> {
//! let registry = Arc::new(Registry::new());
//! let group = registry.new_group("scores", 2 << 10, |key: String| async move {
//!     Ok(format!("value of {}", key).into_bytes())
//! });
//!
//! let pool = Arc::new(HttpPool::new("http://localhost:8001", registry.clone())?);
//! pool.set_peers(["http://localhost:8001", "http://localhost:8002"]);
//! group.register_peers(pool)?;
//!
//! let value = group.get("Tom").await?;
//! println!("{}", value);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Byte views, the LRU and its thread-safe wrapper
//! - [`error`] - Error types
//! - [`group`] - Groups, the registry and per-group statistics
//! - [`hashring`] - Consistent hash ring
//! - [`metrics`] - Prometheus text exposition
//! - [`peers`] - Peer picking and fetching traits
//! - [`singleflight`] - In-flight call deduplication
//! - [`transport`] - HTTP peer transport and front end

pub mod cache;
pub mod error;
pub mod group;
pub mod hashring;
pub mod metrics;
pub mod peers;
pub mod singleflight;
pub mod transport;

// Re-export commonly used types
pub use cache::{ByteView, ConcurrentCache, LruCache};
pub use error::{Error, Result};
pub use group::{get_group, new_group, Getter, Group, GroupConfig, Registry, StatsSnapshot};
pub use hashring::HashRing;
pub use peers::{PeerGetter, PeerPicker};
pub use singleflight::SingleFlight;
pub use transport::{ApiHandler, HttpGetter, HttpPool, PoolConfig};
