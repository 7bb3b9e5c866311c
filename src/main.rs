//! PeerCache Node
//!
//! Runs one cache node: a demo group backed by an in-memory "slow database",
//! the peer server, and optionally the client-facing API.
//!
//! ```text
//!  clients ──GET /api?key=──▶ ┌──────────────┐
//!                             │  ApiHandler  │
//!                             └──────┬───────┘
//!                                    ▼
//!  peers ──GET /_peercache/──▶ ┌──────────────┐ ──▶ owning peer
//!                              │ Group + Pool │
//!                              └──────┬───────┘
//!                                     ▼
//!                                  slow db
//! ```
//!
//! A three-node cluster on one host:
//!
//! ```text
//! peercache --addr 127.0.0.1:8001 --peers http://127.0.0.1:8001,http://127.0.0.1:8002,http://127.0.0.1:8003 --api-addr 127.0.0.1:9999
//! peercache --addr 127.0.0.1:8002 --peers http://127.0.0.1:8001,http://127.0.0.1:8002,http://127.0.0.1:8003
//! peercache --addr 127.0.0.1:8003 --peers http://127.0.0.1:8001,http://127.0.0.1:8002,http://127.0.0.1:8003
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use peercache::transport::{self, ApiHandler, HttpPool, PoolConfig};
use peercache::{Error, GroupConfig, Registry};

// =============================================================================
// CLI Arguments
// =============================================================================

/// PeerCache node - distributed look-aside cache
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Peer server bind address
    #[arg(long, env = "PEERCACHE_ADDR", default_value = "127.0.0.1:8001")]
    addr: String,

    /// Comma-separated peer base URLs, including this node's own
    #[arg(long, env = "PEERCACHE_PEERS", value_delimiter = ',')]
    peers: Vec<String>,

    /// Client API bind address (disabled when unset)
    #[arg(long, env = "PEERCACHE_API_ADDR")]
    api_addr: Option<String>,

    /// Name of the demo group
    #[arg(long, env = "PEERCACHE_GROUP", default_value = "scores")]
    group: String,

    /// Local cache budget in bytes (0 = unbounded)
    #[arg(long, env = "PEERCACHE_CACHE_BYTES", default_value = "67108864")]
    cache_bytes: usize,

    /// Virtual nodes per peer on the hash ring
    #[arg(long, env = "PEERCACHE_REPLICAS", default_value = "50")]
    replicas: usize,

    /// Upper bound on one load in milliseconds (unbounded when unset)
    #[arg(long, env = "PEERCACHE_LOAD_TIMEOUT_MS")]
    load_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    let self_url = format!("http://{}", args.addr);
    let mut peers = args.peers.clone();
    if peers.is_empty() {
        peers.push(self_url.clone());
    }

    info!("Starting PeerCache node");
    info!("  Self URL: {}", self_url);
    info!("  Peers: {}", peers.join(", "));
    info!("  Group: {} ({} bytes)", args.group, args.cache_bytes);

    let registry = Arc::new(Registry::new());
    let config = GroupConfig {
        cache_bytes: args.cache_bytes,
        load_timeout: args.load_timeout_ms.map(Duration::from_millis),
    };
    let db = Arc::new(demo_db());
    let group = registry.new_group_with_config(args.group.clone(), config, move |key: String| {
        let db = Arc::clone(&db);
        async move {
            info!("[SlowDB] search key {}", key);
            tokio::time::sleep(Duration::from_millis(100)).await;
            db.get(&key)
                .map(|v| v.clone().into_bytes())
                .ok_or_else(|| Error::backend(format!("{} not exist", key)))
        }
    });

    let pool_config = PoolConfig {
        replicas: args.replicas,
        ..Default::default()
    };
    let pool = Arc::new(HttpPool::with_config(self_url, Arc::clone(&registry), pool_config)?);
    pool.set_peers(&peers);
    group.register_peers(pool.clone())?;

    let shutdown = CancellationToken::new();
    let mut servers = Vec::new();

    let listener = TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind peer server on {}", args.addr))?;
    servers.push(tokio::spawn(transport::serve(listener, pool, shutdown.clone())));

    if let Some(api_addr) = &args.api_addr {
        let listener = TcpListener::bind(api_addr)
            .await
            .with_context(|| format!("Failed to bind API server on {}", api_addr))?;
        let api = Arc::new(ApiHandler::new(Arc::clone(&group)));
        servers.push(tokio::spawn(transport::serve(listener, api, shutdown.clone())));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown signal received");
    shutdown.cancel();

    for server in servers {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Server error: {}", e),
            Err(e) => error!("Server task failed: {}", e),
        }
    }

    info!("Node shutdown complete");
    Ok(())
}

/// Backing store of the demo group
fn demo_db() -> HashMap<String, String> {
    [("Tom", "630"), ("Jack", "589"), ("Sam", "567")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("reqwest=warn".parse()?);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
    Ok(())
}
