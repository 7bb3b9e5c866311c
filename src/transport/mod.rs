//! HTTP Peer Transport
//!
//! Nodes talk to each other over plain HTTP/1.1:
//!
//! ```text
//! ┌────────────┐  GET {base_path}{group}/{key}   ┌────────────┐
//! │  node A    │ ───────────────────────────────▶│  node B    │
//! │ HttpGetter │ ◀─────────────────────────────── │  HttpPool  │
//! └────────────┘   200 application/octet-stream  └────────────┘
//! ```
//!
//! - [`HttpPool`] is both the server side (answers peer requests) and the
//!   [`crate::PeerPicker`] that routes keys over the ring
//! - [`HttpGetter`] is the client for one remote peer
//! - [`ApiHandler`] is an optional client-facing front end
//! - [`serve`] runs any [`Handler`] on a TCP listener until shutdown

mod api;
mod client;
mod pool;
mod server;

use std::time::Duration;

use crate::hashring::DEFAULT_REPLICAS;

pub use api::ApiHandler;
pub use client::HttpGetter;
pub use pool::HttpPool;
pub use server::{serve, Handler, HttpResponse};

/// Default URL prefix for peer requests
pub const DEFAULT_BASE_PATH: &str = "/_peercache/";

/// Peer pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// URL prefix of peer requests; must start and end with `/`
    pub base_path: String,
    /// Virtual nodes per peer on the ring
    pub replicas: usize,
    /// Timeout for one outbound peer request
    pub request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: DEFAULT_REPLICAS,
            request_timeout: Duration::from_secs(5),
        }
    }
}
