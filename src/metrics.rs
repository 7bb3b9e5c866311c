//! Prometheus Exposition
//!
//! Renders every group's counters in the Prometheus text format, one series
//! per group (`group` label). Values are read from the groups at render time
//! into a scratch registry, so nothing has to be kept in sync.

use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, TextEncoder};

use crate::error::{Error, Result};
use crate::group::{Registry, StatsSnapshot};

type Read = fn(&StatsSnapshot) -> u64;

const COUNTERS: &[(&str, &str, Read)] = &[
    ("peercache_gets_total", "Lookups received", |s| s.gets),
    ("peercache_cache_hits_total", "Lookups served from the local cache", |s| s.cache_hits),
    ("peercache_loads_total", "Lookups that missed the local cache", |s| s.loads),
    ("peercache_fetches_total", "Fetches actually executed after deduplication", |s| {
        s.fetches
    }),
    ("peercache_peer_loads_total", "Values fetched from a remote peer", |s| s.peer_loads),
    ("peercache_peer_errors_total", "Failed remote peer fetches", |s| s.peer_errors),
    ("peercache_local_loads_total", "Values produced by the local getter", |s| s.local_loads),
    ("peercache_local_load_errors_total", "Local getter failures", |s| s.local_load_errors),
    ("peercache_server_requests_total", "Requests served to other peers", |s| s.server_requests),
    ("peercache_evictions_total", "Entries evicted from the local cache", |s| s.evictions),
];

struct Sample {
    group: String,
    stats: StatsSnapshot,
    entries: usize,
    bytes: usize,
}

/// Render all groups in `registry` as Prometheus text
pub fn render(registry: &Registry) -> Result<String> {
    let samples: Vec<Sample> = registry
        .groups()
        .iter()
        .map(|g| Sample {
            group: g.name().to_string(),
            stats: g.stats(),
            entries: g.cache_len(),
            bytes: g.cache_bytes(),
        })
        .collect();

    let scratch = prometheus::Registry::new();

    for (name, help, read) in COUNTERS {
        let counter = IntCounterVec::new(Opts::new(*name, *help), &["group"]).map_err(encoding_error)?;
        for sample in &samples {
            counter
                .with_label_values(&[sample.group.as_str()])
                .inc_by(read(&sample.stats));
        }
        scratch.register(Box::new(counter)).map_err(encoding_error)?;
    }

    let entries = IntGaugeVec::new(
        Opts::new("peercache_cache_entries", "Entries resident in the local cache"),
        &["group"],
    )
    .map_err(encoding_error)?;
    let bytes = IntGaugeVec::new(
        Opts::new("peercache_cache_bytes", "Bytes charged by the local cache"),
        &["group"],
    )
    .map_err(encoding_error)?;
    let hit_ratio = GaugeVec::new(
        Opts::new("peercache_hit_ratio", "Share of lookups served from the local cache"),
        &["group"],
    )
    .map_err(encoding_error)?;

    for sample in &samples {
        let label = [sample.group.as_str()];
        entries.with_label_values(&label).set(sample.entries as i64);
        bytes.with_label_values(&label).set(sample.bytes as i64);
        hit_ratio.with_label_values(&label).set(sample.stats.hit_ratio);
    }

    scratch.register(Box::new(entries)).map_err(encoding_error)?;
    scratch.register(Box::new(bytes)).map_err(encoding_error)?;
    scratch.register(Box::new(hit_ratio)).map_err(encoding_error)?;

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&scratch.gather(), &mut buffer)
        .map_err(encoding_error)?;
    String::from_utf8(buffer).map_err(encoding_error)
}

fn encoding_error(e: impl std::fmt::Display) -> Error {
    Error::Internal(format!("Failed to encode metrics: {}", e))
}

// =============================================================================
// Tests
// =============================================================================
