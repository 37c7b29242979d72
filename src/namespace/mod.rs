//! Namespaces
//!
//! A namespace is an isolated cache domain: one local shard, one loader, an
//! optional peer picker and a coalescer tying them together.
//!
//! # Miss Handling
//!
//! ```text
//! get(key)
//!   │
//!   ├── key empty ────────────────────────────► EmptyKey
//!   ├── local shard hit ──────────────────────► value
//!   └── miss ── coalescer.run(key, fill)
//!                 │
//!                 ├── owner is a remote peer ── fetch ok ──► value (not cached)
//!                 │                        └── fetch err ─┐
//!                 └── owner is this node ─────────────────┴► loader
//!                                                             ├── ok ──► cache + value
//!                                                             └── err ─► error
//! ```

mod registry;
mod stats;

pub use registry::{NamespaceBuilder, Registry};
pub use stats::{NamespaceStats, StatsSnapshot};

use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::OnceCell;
use tracing::{debug, info, instrument, warn, Instrument};

use crate::cache::{BoundedCache, ByteView, EvictionCallback};
use crate::coalesce::Coalescer;
use crate::domain::ports::{Loader, PeerPicker};
use crate::error::{Error, Result};

/// An isolated, named cache domain.
pub struct Namespace {
    shared: Arc<Shared>,
    coalescer: Coalescer<ByteView>,
}

/// State a fill needs; owned jointly by the namespace and any running fill.
struct Shared {
    name: String,
    loader: Arc<dyn Loader>,
    cache: BoundedCache,
    peers: OnceCell<Arc<dyn PeerPicker>>,
    stats: NamespaceStats,
}

impl Namespace {
    /// Create a standalone namespace holding at most `cache_bytes` locally
    /// (0 = unbounded). Use a [`Registry`] to make it discoverable by name.
    pub fn new(name: impl Into<String>, cache_bytes: u64, loader: Arc<dyn Loader>) -> Self {
        Self::with_cache(name.into(), BoundedCache::new(cache_bytes), loader)
    }

    pub(crate) fn with_cache(name: String, cache: BoundedCache, loader: Arc<dyn Loader>) -> Self {
        Self {
            shared: Arc::new(Shared {
                name,
                loader,
                cache,
                peers: OnceCell::new(),
                stats: NamespaceStats::new(),
            }),
            coalescer: Coalescer::new(),
        }
    }

    pub(crate) fn with_eviction_callback(
        name: String,
        cache_bytes: u64,
        loader: Arc<dyn Loader>,
        on_evicted: EvictionCallback<ByteView>,
    ) -> Self {
        Self::with_cache(
            name,
            BoundedCache::with_eviction_callback(cache_bytes, on_evicted),
            loader,
        )
    }

    /// Attach the peer picker used to route misses.
    ///
    /// Allowed once; a second attempt fails with
    /// [`Error::PeersAlreadyRegistered`] and leaves the first picker in place.
    pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) -> Result<()> {
        self.shared
            .peers
            .set(peers)
            .map_err(|_| Error::PeersAlreadyRegistered(self.shared.name.clone()))?;
        info!(namespace = %self.shared.name, "Peer picker registered");
        Ok(())
    }

    /// Get the value for `key`, filling it from a peer or the loader on a miss.
    ///
    /// A fill runs on its own task: dropping this future stops the wait, not
    /// the fill other callers may be sharing.
    #[instrument(skip(self), fields(namespace = %self.shared.name))]
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        let shared = &self.shared;
        shared.stats.record_get();
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        if let Some(value) = shared.cache.get(key) {
            shared.stats.record_cache_hit();
            debug!("cache hit");
            return Ok(value);
        }

        shared.stats.record_load();
        let fill = Arc::clone(shared).fill(key.to_string()).in_current_span();
        self.coalescer.run(key, move || fill).await
    }

    /// Namespace name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Local shard
    pub fn cache(&self) -> &BoundedCache {
        &self.shared.cache
    }

    /// Request counters
    pub fn stats(&self) -> &NamespaceStats {
        &self.shared.stats
    }

    /// Whether a peer picker has been attached
    pub fn has_peers(&self) -> bool {
        self.shared.peers.get().is_some()
    }
}

impl Shared {
    /// Resolve a miss. Runs at most once per key at a time.
    async fn fill(self: Arc<Self>, key: String) -> Result<ByteView> {
        self.stats.record_load_deduped();

        // A fill that finished between the caller's miss and this one
        // starting already populated the shard. Not counted as a cache hit.
        if let Some(value) = self.cache.peek(&key) {
            debug!("filled by an earlier load");
            return Ok(value);
        }

        let started = Instant::now();

        if let Some(peer) = self.peers.get().and_then(|peers| peers.pick_peer(&key)) {
            match peer.client.fetch(&self.name, &key).await {
                Ok(bytes) => {
                    self.stats.record_peer_load();
                    self.stats.record_fill_latency(started.elapsed());
                    debug!(peer = %peer.address, "loaded from peer");
                    return Ok(ByteView::from(bytes));
                }
                Err(e) => {
                    self.stats.record_peer_error();
                    warn!(peer = %peer.address, error = %e, "Peer fetch failed, loading locally");
                }
            }
        }

        let value = match self.loader.load(&key).await {
            Ok(bytes) => ByteView::from(bytes),
            Err(e) => {
                self.stats.record_local_load_err();
                debug!(error = %e, "loader failed");
                return Err(e);
            }
        };

        self.stats.record_local_load();
        self.stats.record_fill_latency(started.elapsed());
        debug!(bytes = value.len(), "loaded from source");
        self.cache.add(key, value.clone());

        Ok(value)
    }
}

impl std::fmt::Debug for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.shared.name)
            .field("cache", &self.shared.cache)
            .field("has_peers", &self.has_peers())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
