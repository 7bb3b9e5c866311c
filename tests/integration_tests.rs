//! PeerCache Integration Tests
//!
//! Tests for the public API:
//! - Groups: local loading, caching and deduplication
//! - Cluster: two nodes routing keys to each other over loopback HTTP

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use peercache::{Error, Registry};

// =============================================================================
// Group Tests
// =============================================================================

mod group_tests {
    use super::*;
    use assert_matches::assert_matches;
    use peercache::GroupConfig;

    #[tokio::test]
    async fn test_lookup_through_registry() {
        let registry = Registry::new();
        registry.new_group("scores", 2 << 10, |key: String| async move {
            match key.as_str() {
                "Tom" => Ok(b"630".to_vec()),
                _ => Err(Error::backend(format!("{} not exist", key))),
            }
        });

        let group = registry.get_group("scores").unwrap();
        assert_eq!(group.get("Tom").await.unwrap().to_string(), "630");
        assert_matches!(group.get("kkk").await, Err(Error::Backend(_)));
        assert_matches!(group.get("").await, Err(Error::EmptyKey));
        assert!(registry.get_group("other").is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_burst_of_misses_hits_backend_once() {
        let registry = Registry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let group = registry.new_group("burst", 0, move |key: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(key.into_bytes())
            }
        });

        let lookups = (0..32).map(|_| {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.get("hot").await })
        });
        for result in futures::future::join_all(lookups).await {
            assert_eq!(result.unwrap().unwrap().as_slice(), b"hot");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = group.stats();
        assert_eq!(stats.gets, 32);
        assert_eq!(stats.fetches, 1);
    }

    #[tokio::test]
    async fn test_eviction_keeps_recent_keys() {
        let registry = Registry::new();
        let config = GroupConfig {
            cache_bytes: 20,
            ..Default::default()
        };
        let group = registry.new_group_with_config("small", config, |key: String| async move {
            Ok(key.into_bytes())
        });

        for key in ["k1", "k2", "k3", "k4", "k5", "k6"] {
            group.get(key).await.unwrap();
        }
        assert!(group.cache_bytes() <= 20);
        assert_eq!(group.cache_len(), 5);
        assert_eq!(group.stats().evictions, 1);
    }
}

// =============================================================================
// Cluster Tests
// =============================================================================

mod cluster_tests {
    use super::*;
    use peercache::transport::{serve, HttpPool};
    use peercache::{Group, PeerPicker};
    use tokio::net::TcpListener;
    use tokio_util::sync::CancellationToken;

    struct Node {
        url: String,
        pool: Arc<HttpPool>,
        group: Arc<Group>,
        backend_calls: Arc<AtomicUsize>,
    }

    /// Start a node whose backend answers `{name}:{key}`
    async fn start_node(name: &'static str, listener: TcpListener, shutdown: &CancellationToken) -> Node {
        let url = format!("http://{}", listener.local_addr().unwrap());
        let registry = Arc::new(Registry::new());

        let backend_calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&backend_calls);
        let group = registry.new_group("scores", 1 << 20, move |key: String| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(format!("{}:{}", name, key).into_bytes()) }
        });

        let pool = Arc::new(HttpPool::new(url.clone(), Arc::clone(&registry)).unwrap());
        group.register_peers(pool.clone()).unwrap();
        tokio::spawn(serve(listener, Arc::clone(&pool), shutdown.clone()));

        Node {
            url,
            pool,
            group,
            backend_calls,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_node_round_trip() {
        let shutdown = CancellationToken::new();
        let a = start_node("a", TcpListener::bind("127.0.0.1:0").await.unwrap(), &shutdown).await;
        let b = start_node("b", TcpListener::bind("127.0.0.1:0").await.unwrap(), &shutdown).await;

        let peers = [a.url.clone(), b.url.clone()];
        a.pool.set_peers(&peers);
        b.pool.set_peers(&peers);

        let keys: Vec<String> = (0..40).map(|i| format!("key-{}", i)).collect();
        let mut remote_from_a = 0;
        for key in &keys {
            let owner = if a.pool.pick_peer(key).is_some() { "b" } else { "a" };
            if owner == "b" {
                remote_from_a += 1;
            }
            let expected = format!("{}:{}", owner, key);

            assert_eq!(a.group.get(key).await.unwrap().to_string(), expected);
            assert_eq!(b.group.get(key).await.unwrap().to_string(), expected);
        }

        // Both nodes own part of the key space
        assert!(remote_from_a > 0 && remote_from_a < keys.len());

        // Each key was loaded from a backend exactly once, on its owner
        let total = a.backend_calls.load(Ordering::SeqCst) + b.backend_calls.load(Ordering::SeqCst);
        assert_eq!(total, keys.len());

        assert_eq!(a.group.stats().peer_loads, remote_from_a as u64);
        assert_eq!(a.group.stats().peer_errors, 0);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_unreachable_peer_falls_back_to_backend() {
        let shutdown = CancellationToken::new();
        let a = start_node("a", TcpListener::bind("127.0.0.1:0").await.unwrap(), &shutdown).await;

        // Reserve a port, then close it so nothing answers there
        let dead = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        a.pool.set_peers([a.url.clone(), dead]);

        let key = (0..100)
            .map(|i| format!("key-{}", i))
            .find(|k| a.pool.pick_peer(k).is_some())
            .unwrap();

        assert_eq!(a.group.get(&key).await.unwrap().to_string(), format!("a:{}", key));
        assert_eq!(a.group.stats().peer_errors, 1);
        assert_eq!(a.backend_calls.load(Ordering::SeqCst), 1);

        shutdown.cancel();
    }

    #[tokio::test]
    async fn test_front_end_api() {
        use peercache::ApiHandler;

        let shutdown = CancellationToken::new();
        let node = start_node("a", TcpListener::bind("127.0.0.1:0").await.unwrap(), &shutdown).await;
        node.pool.set_peers([node.url.clone()]);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = listener.local_addr().unwrap();
        tokio::spawn(serve(
            listener,
            Arc::new(ApiHandler::new(Arc::clone(&node.group))),
            shutdown.clone(),
        ));

        let response = reqwest::get(format!("http://{}/api?key=Tom", api_addr)).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "a:Tom");

        let response = reqwest::get(format!("{}/_peercache/scores/Sam", node.url)).await.unwrap();
        assert_eq!(response.text().await.unwrap(), "a:Sam");

        let response = reqwest::get(format!("{}/_peercache/missing/Sam", node.url)).await.unwrap();
        assert_eq!(response.status(), 404);

        shutdown.cancel();
    }
}
