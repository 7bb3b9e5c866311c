//! Error types for the cache

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error accepted from backend fetch implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while looking up, loading or serving cached values
///
/// `Error` is `Clone`: one failed load is handed unchanged to every caller
/// that was waiting on it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Lookup with an empty key
    #[error("key is required")]
    EmptyKey,

    /// The user-supplied getter failed
    #[error("backend fetch failed: {0}")]
    Backend(Arc<dyn std::error::Error + Send + Sync>),

    /// A remote peer could not serve the value
    #[error("fetch from peer {peer} failed: {reason}")]
    PeerFetch { peer: String, reason: String },

    /// The load did not finish within the configured timeout
    #[error("load of key {key:?} timed out after {timeout:?}")]
    Timeout { key: String, timeout: Duration },

    /// The caller gave up before the value was available
    #[error("request cancelled")]
    Cancelled,

    /// No group registered under this name
    #[error("no such group: {0}")]
    GroupNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap a backend failure so it can be shared between waiters
    pub fn backend<E: Into<BoxError>>(err: E) -> Self {
        Error::Backend(Arc::from(err.into()))
    }

    /// Whether this error came from the caller's own cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

// =============================================================================
// Tests
// =============================================================================
