//! HTTP Peer Client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};
use crate::peers::PeerGetter;

/// Fetches values from one remote peer
///
/// `base_url` is the peer's URL including the base path, e.g.
/// `http://10.0.0.2:8001/_peercache/`.
#[derive(Debug, Clone)]
pub struct HttpGetter {
    base_url: String,
    client: Client,
}

impl HttpGetter {
    /// Create a getter with its own HTTP client
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Create a getter sharing an existing client's connection pool
    pub(crate) fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            urlencoding::encode(group),
            urlencoding::encode(key)
        )
    }

    fn fetch_error(&self, reason: impl std::fmt::Display) -> Error {
        Error::PeerFetch {
            peer: self.base_url.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl PeerGetter for HttpGetter {
    async fn fetch(&self, group: &str, key: &str) -> Result<Vec<u8>> {
        let url = self.url(group, key);
        debug!(url = %url, "fetching from peer");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.fetch_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.fetch_error(format!("server returned {}: {}", status, body.trim())));
        }

        let body = response.bytes().await.map_err(|e| self.fetch_error(e))?;
        Ok(body.to_vec())
    }

    fn peer_id(&self) -> &str {
        &self.base_url
    }
}

// =============================================================================
// Tests
// =============================================================================
