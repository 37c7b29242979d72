//! Namespace Statistics
//!
//! Lock-free counters describing how a namespace answered its requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Per-namespace counters
#[derive(Debug, Default)]
pub struct NamespaceStats {
    /// Every `get`, including rejected ones
    gets: AtomicU64,
    /// Gets answered by the local cache
    cache_hits: AtomicU64,
    /// Misses that went into the coalescer
    loads: AtomicU64,
    /// Fills actually executed after coalescing
    loads_deduped: AtomicU64,
    /// Values served by a remote peer
    peer_loads: AtomicU64,
    /// Failed peer fetches (each one falls back to the loader)
    peer_errors: AtomicU64,
    /// Successful loader calls
    local_loads: AtomicU64,
    /// Failed loader calls
    local_load_errs: AtomicU64,
    /// Requests received from other peers
    server_requests: AtomicU64,

    // Fill latency (microseconds, exponential moving average)
    fill_latency_us: AtomicU64,
}

impl NamespaceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load(&self) {
        self.loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_load_deduped(&self) {
        self.loads_deduped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_load(&self) {
        self.peer_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_peer_error(&self) {
        self.peer_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load(&self) {
        self.local_loads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_load_err(&self) {
        self.local_load_errs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_server_request(&self) {
        self.server_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fill_latency(&self, duration: Duration) {
        let new_us = duration.as_micros() as u64;
        let alpha = 0.1; // EMA smoothing factor

        loop {
            let current = self.fill_latency_us.load(Ordering::Relaxed);
            let updated = if current == 0 {
                new_us
            } else {
                ((1.0 - alpha) * current as f64 + alpha * new_us as f64) as u64
            };

            if self
                .fill_latency_us
                .compare_exchange_weak(current, updated, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                break;
            }
        }
    }

    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn loads(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn loads_deduped(&self) -> u64 {
        self.loads_deduped.load(Ordering::Relaxed)
    }

    pub fn peer_loads(&self) -> u64 {
        self.peer_loads.load(Ordering::Relaxed)
    }

    pub fn peer_errors(&self) -> u64 {
        self.peer_errors.load(Ordering::Relaxed)
    }

    pub fn local_loads(&self) -> u64 {
        self.local_loads.load(Ordering::Relaxed)
    }

    pub fn local_load_errs(&self) -> u64 {
        self.local_load_errs.load(Ordering::Relaxed)
    }

    pub fn server_requests(&self) -> u64 {
        self.server_requests.load(Ordering::Relaxed)
    }

    pub fn fill_latency(&self) -> Duration {
        Duration::from_micros(self.fill_latency_us.load(Ordering::Relaxed))
    }

    /// Share of gets answered locally
    pub fn hit_ratio(&self) -> f64 {
        let gets = self.gets();
        if gets == 0 {
            0.0
        } else {
            self.cache_hits() as f64 / gets as f64
        }
    }

    /// Get a snapshot of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets(),
            cache_hits: self.cache_hits(),
            loads: self.loads(),
            loads_deduped: self.loads_deduped(),
            peer_loads: self.peer_loads(),
            peer_errors: self.peer_errors(),
            local_loads: self.local_loads(),
            local_load_errs: self.local_load_errs(),
            server_requests: self.server_requests(),
            hit_ratio: self.hit_ratio(),
            fill_latency: self.fill_latency(),
        }
    }
}

/// Point-in-time copy of [`NamespaceStats`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub cache_hits: u64,
    pub loads: u64,
    pub loads_deduped: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub local_loads: u64,
    pub local_load_errs: u64,
    pub server_requests: u64,
    pub hit_ratio: f64,
    pub fill_latency: Duration,
}

// =============================================================================
// Tests
// =============================================================================
