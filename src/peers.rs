//! Peer Ports
//!
//! Abstractions a [`crate::Group`] uses to reach the node that owns a key.
//! The HTTP implementation lives in [`crate::transport`]; anything else
//! (custom RPC, in-process fakes for tests) can implement these traits.
//!
//! ```text
//! Group ──pick_peer(key)──▶ PeerPicker ──▶ Option<PeerGetter>
//!   │                                           │
//!   └────────────fetch(group, key)──────────────┘
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;

/// Locates the remote peer that owns a key
pub trait PeerPicker: Send + Sync {
    /// Return the owning peer, or `None` when the key is owned locally
    /// or no peer is available
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}

/// Client for fetching a value from one remote peer
#[async_trait]
pub trait PeerGetter: Send + Sync {
    /// Fetch the value of `key` in group `group` from the peer
    async fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>>;

    /// Identifier used in logs
    fn peer_id(&self) -> &str {
        "peer"
    }
}
