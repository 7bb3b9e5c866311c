//! HTTP Peer Pool
//!
//! Server side of the peer protocol plus the ring-backed [`PeerPicker`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Method, Request, StatusCode};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::client::HttpGetter;
use super::server::{error_status, respond, text, Handler, HttpResponse};
use super::PoolConfig;
use crate::error::{Error, Result};
use crate::group::Registry;
use crate::hashring::HashRing;
use crate::metrics;
use crate::peers::{PeerGetter, PeerPicker};

/// Ring and clients for the current peer set
struct PeerSet {
    ring: HashRing,
    getters: HashMap<String, Arc<HttpGetter>>,
}

/// Peer pool for one node
///
/// Answers `GET {base_path}{group}/{key}` from other nodes and routes this
/// node's misses to the owning peer.
pub struct HttpPool {
    /// This node's base URL, e.g. `http://10.0.0.1:8001`
    self_url: String,
    config: PoolConfig,
    registry: Arc<Registry>,
    client: reqwest::Client,
    peers: RwLock<PeerSet>,
}

impl HttpPool {
    /// Create a pool with default settings
    pub fn new(self_url: impl Into<String>, registry: Arc<Registry>) -> Result<Self> {
        Self::with_config(self_url, registry, PoolConfig::default())
    }

    /// Create a pool with explicit settings
    pub fn with_config(
        self_url: impl Into<String>,
        registry: Arc<Registry>,
        config: PoolConfig,
    ) -> Result<Self> {
        if !config.base_path.starts_with('/') || !config.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                config.base_path
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            self_url: normalize(&self_url.into()),
            peers: RwLock::new(PeerSet {
                ring: HashRing::new(config.replicas),
                getters: HashMap::new(),
            }),
            config,
            registry,
            client,
        })
    }

    /// This node's base URL
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Replace the peer set. `peers` are base URLs and should include this
    /// node's own URL.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let peers: Vec<String> = peers.into_iter().map(|p| normalize(p.as_ref())).collect();

        let mut ring = HashRing::new(self.config.replicas);
        ring.add(&peers);

        let getters = peers
            .iter()
            .map(|peer| {
                let base_url = format!("{}{}", peer, self.config.base_path);
                let getter = HttpGetter::with_client(base_url, self.client.clone());
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        *self.peers.write() = PeerSet { ring, getters };
        info!(self_url = %self.self_url, peers = ?peers, "peer set updated");
    }

    /// Current peers, sorted
    pub fn peers(&self) -> Vec<String> {
        self.peers.read().ring.nodes()
    }

    /// Answer one peer request; `path` is what follows the base path
    async fn serve_peer(&self, method: &Method, path: &str) -> HttpResponse {
        if method != Method::GET {
            return text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        let Some((group_name, key)) = path.split_once('/') else {
            return text(StatusCode::BAD_REQUEST, "bad request");
        };
        let (group_name, key) = match (urlencoding::decode(group_name), urlencoding::decode(key)) {
            (Ok(g), Ok(k)) if !g.is_empty() => (g.into_owned(), k.into_owned()),
            _ => return text(StatusCode::BAD_REQUEST, "bad request"),
        };

        debug!(self_url = %self.self_url, group = %group_name, key = %key, "serving peer request");

        let Some(group) = self.registry.get_group(&group_name) else {
            let err = Error::GroupNotFound(group_name);
            return text(error_status(&err), err.to_string());
        };
        group.record_server_request();

        match group.get(&key).await {
            Ok(value) => respond(StatusCode::OK, "application/octet-stream", value.to_bytes()),
            Err(err) => {
                warn!(group = %group_name, key = %key, error = %err, "peer request failed");
                text(error_status(&err), err.to_string())
            }
        }
    }

    fn render_metrics(&self) -> HttpResponse {
        match metrics::render(&self.registry) {
            Ok(body) => respond(StatusCode::OK, prometheus::TEXT_FORMAT, body),
            Err(err) => text(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }

    fn render_stats(&self) -> HttpResponse {
        let stats: HashMap<String, _> = self
            .registry
            .groups()
            .iter()
            .map(|g| (g.name().to_string(), g.stats()))
            .collect();
        match serde_json::to_vec(&stats) {
            Ok(body) => respond(StatusCode::OK, "application/json", body),
            Err(err) => text(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let peers = self.peers.read();
        let owner = peers.ring.get(key)?;
        if owner == self.self_url {
            return None;
        }

        debug!(self_url = %self.self_url, peer = owner, key, "picked peer");
        let getter = peers.getters.get(owner)?;
        Some(Arc::clone(getter) as Arc<dyn PeerGetter>)
    }
}

#[async_trait]
impl Handler for HttpPool {
    async fn handle(&self, req: Request<()>) -> HttpResponse {
        let path = req.uri().path();
        match path {
            "/healthz" => text(StatusCode::OK, "ok"),
            "/metrics" => self.render_metrics(),
            "/stats" => self.render_stats(),
            _ => match path.strip_prefix(self.config.base_path.as_str()) {
                Some(rest) => self.serve_peer(req.method(), rest).await,
                None => text(StatusCode::NOT_FOUND, "not found"),
            },
        }
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("config", &self.config)
            .field("peers", &self.peers())
            .finish()
    }
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    fn pool_with_scores() -> HttpPool {
        let registry = Arc::new(Registry::new());
        registry.new_group("scores", 2 << 10, |key: String| async move {
            match key.as_str() {
                "Tom" => Ok(b"630".to_vec()),
                "a/b c" => Ok(b"escaped".to_vec()),
                _ => Err(Error::backend(format!("{} not exist", key))),
            }
        });
        HttpPool::new("http://localhost:8001", registry).unwrap()
    }

    async fn get(pool: &HttpPool, uri: &str) -> (StatusCode, String) {
        let req = Request::get(uri).body(()).unwrap();
        let response = pool.handle(req).await;
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    #[tokio::test]
    async fn test_serve_value() {
        let pool = pool_with_scores();
        let (status, body) = get(&pool, "/_peercache/scores/Tom").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "630");

        let group = pool.registry.get_group("scores").unwrap();
        assert_eq!(group.stats().server_requests, 1);
    }

    #[tokio::test]
    async fn test_serve_percent_encoded_key() {
        let pool = pool_with_scores();
        let (status, body) = get(&pool, "/_peercache/scores/a%2Fb%20c").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "escaped");
    }

    #[tokio::test]
    async fn test_serve_errors() {
        let pool = pool_with_scores();

        assert_eq!(get(&pool, "/_peercache/scores").await.0, StatusCode::BAD_REQUEST);
        assert_eq!(get(&pool, "/_peercache/scores/").await.0, StatusCode::BAD_REQUEST);
        assert_eq!(get(&pool, "/_peercache/nope/Tom").await.0, StatusCode::NOT_FOUND);
        assert_eq!(get(&pool, "/elsewhere").await.0, StatusCode::NOT_FOUND);

        let (status, body) = get(&pool, "/_peercache/scores/kkk").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("kkk not exist"));
    }

    #[tokio::test]
    async fn test_health_stats_and_metrics() {
        let pool = pool_with_scores();
        assert_eq!(get(&pool, "/healthz").await, (StatusCode::OK, "ok".to_string()));

        get(&pool, "/_peercache/scores/Tom").await;
        let (status, body) = get(&pool, "/stats").await;
        assert_eq!(status, StatusCode::OK);
        let stats: HashMap<String, serde_json::Value> = serde_json::from_str(&body).unwrap();
        assert_eq!(stats["scores"]["local_loads"], 1);

        let (status, body) = get(&pool, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("peercache_gets_total{group=\"scores\"} 1"));
    }

    #[test]
    fn test_pick_peer_never_self() {
        let pool = pool_with_scores();
        assert!(pool.pick_peer("Tom").is_none());

        pool.set_peers(["http://localhost:8001/"]);
        for i in 0..100 {
            assert!(pool.pick_peer(&format!("key-{}", i)).is_none());
        }
    }

    #[test]
    fn test_pick_peer_routes_to_others() {
        let pool = pool_with_scores();
        pool.set_peers([
            "http://localhost:8001",
            "http://localhost:8002",
            "http://localhost:8003",
        ]);
        assert_eq!(pool.peers().len(), 3);

        let remote: Vec<String> = (0..300)
            .filter_map(|i| pool.pick_peer(&format!("key-{}", i)))
            .map(|peer| peer.peer_id().to_string())
            .collect();
        assert!(!remote.is_empty());
        assert!(remote.len() < 300);
        assert!(remote.iter().all(|id| id.ends_with("/_peercache/")));
        assert!(remote.iter().all(|id| !id.starts_with("http://localhost:8001/")));
    }

    #[test]
    fn test_invalid_base_path() {
        let config = PoolConfig {
            base_path: "no-slash".to_string(),
            ..Default::default()
        };
        let result = HttpPool::with_config("http://localhost:8001", Arc::new(Registry::new()), config);
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
