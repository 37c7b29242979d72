//! Prometheus Exposition
//!
//! Renders every namespace's counters in the Prometheus text format. A fresh
//! `prometheus::Registry` is filled on each scrape from the namespace stats,
//! so several nodes can live in one process without sharing collectors.

use prometheus::{Encoder, IntCounterVec, IntGaugeVec, Opts, Registry as PromRegistry, TextEncoder};

use crate::error::{Error, Result};
use crate::namespace::Registry;

/// Content type of the rendered exposition
pub const CONTENT_TYPE: &str = prometheus::TEXT_FORMAT;

const LABELS: &[&str] = &["namespace"];

fn counter(prom: &PromRegistry, name: &str, help: &str) -> Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), LABELS)
        .map_err(|e| Error::Internal(format!("Failed to create {}: {}", name, e)))?;
    prom.register(Box::new(counter.clone()))
        .map_err(|e| Error::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(counter)
}

fn gauge(prom: &PromRegistry, name: &str, help: &str) -> Result<IntGaugeVec> {
    let gauge = IntGaugeVec::new(Opts::new(name, help), LABELS)
        .map_err(|e| Error::Internal(format!("Failed to create {}: {}", name, e)))?;
    prom.register(Box::new(gauge.clone()))
        .map_err(|e| Error::Internal(format!("Failed to register {}: {}", name, e)))?;
    Ok(gauge)
}

/// Render the metrics of every namespace in `registry`
pub fn render(registry: &Registry) -> Result<Vec<u8>> {
    let prom = PromRegistry::new();

    let gets = counter(&prom, "peercache_gets_total", "Get requests, including rejected ones")?;
    let hits = counter(&prom, "peercache_cache_hits_total", "Gets answered by the local shard")?;
    let loads = counter(&prom, "peercache_loads_total", "Misses entering request coalescing")?;
    let deduped = counter(
        &prom,
        "peercache_loads_deduped_total",
        "Fills executed after request coalescing",
    )?;
    let peer_loads = counter(&prom, "peercache_peer_loads_total", "Values served by a remote peer")?;
    let peer_errors = counter(&prom, "peercache_peer_errors_total", "Failed peer fetches")?;
    let local_loads = counter(&prom, "peercache_local_loads_total", "Successful source loads")?;
    let local_errs = counter(&prom, "peercache_local_load_errors_total", "Failed source loads")?;
    let server_requests = counter(
        &prom,
        "peercache_server_requests_total",
        "Requests received from other peers",
    )?;
    let evictions = counter(&prom, "peercache_evictions_total", "Entries evicted from the local shard")?;
    let cache_bytes = gauge(&prom, "peercache_cache_bytes", "Bytes held by the local shard")?;
    let cache_items = gauge(&prom, "peercache_cache_items", "Entries held by the local shard")?;
    let capacity = gauge(&prom, "peercache_cache_capacity_bytes", "Local shard capacity (0 = unbounded)")?;

    for namespace in registry.namespaces() {
        let label = &[namespace.name()];
        let stats = namespace.stats().snapshot();
        let cache = namespace.cache();

        gets.with_label_values(label).inc_by(stats.gets);
        hits.with_label_values(label).inc_by(stats.cache_hits);
        loads.with_label_values(label).inc_by(stats.loads);
        deduped.with_label_values(label).inc_by(stats.loads_deduped);
        peer_loads.with_label_values(label).inc_by(stats.peer_loads);
        peer_errors.with_label_values(label).inc_by(stats.peer_errors);
        local_loads.with_label_values(label).inc_by(stats.local_loads);
        local_errs.with_label_values(label).inc_by(stats.local_load_errs);
        server_requests.with_label_values(label).inc_by(stats.server_requests);
        evictions.with_label_values(label).inc_by(cache.evictions());
        cache_bytes.with_label_values(label).set(cache.size_bytes() as i64);
        cache_items.with_label_values(label).set(cache.len() as i64);
        capacity.with_label_values(label).set(cache.capacity() as i64);
    }

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&prom.gather(), &mut buffer)
        .map_err(|e| Error::Internal(format!("Failed to encode metrics: {}", e)))?;

    Ok(buffer)
}

// =============================================================================
// Tests
// =============================================================================
