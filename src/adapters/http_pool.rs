//! HTTP Peer Pool
//!
//! Implements the `PeerPicker` port: a consistent hash ring of peer base URLs
//! plus one [`HttpPeerClient`] per remote peer.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use reqwest::Client;
use tracing::info;

use super::http_client::{build_client, HttpPeerClient};
use super::wire::DEFAULT_BASE_PATH;
use crate::domain::ports::{PeerPicker, PickedPeer};
use crate::error::{Error, Result};
use crate::ring::{self, HashFn, HashRing};

/// Default timeout for a single peer fetch
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool options
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// URL prefix of the peer protocol
    pub base_path: String,
    /// Virtual nodes per peer
    pub replicas: usize,
    /// Ring hash
    pub hash_fn: HashFn,
    /// Timeout of a single peer fetch
    pub request_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            replicas: ring::DEFAULT_REPLICAS,
            hash_fn: ring::crc32,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// The set of peers this node routes to, this node included.
pub struct HttpPool {
    /// This node's base URL, as it appears in the peer list
    self_url: String,
    options: PoolOptions,
    ring: HashRing,
    clients: RwLock<HashMap<String, Arc<HttpPeerClient>>>,
    http: Client,
}

impl HttpPool {
    /// Create an empty pool for the node reachable at `self_url`
    pub fn new(self_url: impl Into<String>, options: PoolOptions) -> Result<Self> {
        let self_url = normalize(&self_url.into());
        if self_url.is_empty() {
            return Err(Error::Config("self URL must not be empty".to_string()));
        }
        if !options.base_path.starts_with('/') || !options.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "base path must start and end with '/': {}",
                options.base_path
            )));
        }

        let http = build_client(options.request_timeout)?;
        let ring = HashRing::with_hash(options.replicas, options.hash_fn);

        Ok(Self {
            self_url,
            options,
            ring,
            clients: RwLock::new(HashMap::new()),
            http,
        })
    }

    /// Add peers by base URL. Peers are never removed; adding a known peer
    /// again is a no-op.
    pub fn add_peers<S: AsRef<str>>(&self, peers: &[S]) {
        let mut clients = self.clients.write();
        let mut known: HashSet<String> = self.ring.nodes().into_iter().collect();
        let new_peers: Vec<String> = peers
            .iter()
            .map(|peer| normalize(peer.as_ref()))
            .filter(|peer| !peer.is_empty() && known.insert(peer.clone()))
            .collect();
        if new_peers.is_empty() {
            return;
        }

        for peer in &new_peers {
            if *peer != self.self_url {
                clients.insert(
                    peer.clone(),
                    Arc::new(HttpPeerClient::with_client(
                        peer.clone(),
                        self.options.base_path.clone(),
                        self.http.clone(),
                    )),
                );
            }
        }
        self.ring.add(&new_peers);

        info!(peers = ?new_peers, total = self.ring.nodes().len(), "Peers added");
    }

    /// This node's base URL
    pub fn self_url(&self) -> &str {
        &self.self_url
    }

    /// URL prefix of the peer protocol
    pub fn base_path(&self) -> &str {
        &self.options.base_path
    }

    /// Every peer on the ring, this node included, sorted
    pub fn peers(&self) -> Vec<String> {
        self.ring.nodes()
    }

    /// The peer owning `key`, whether remote or this node
    pub fn owner(&self, key: &str) -> Option<String> {
        self.ring.get(key)
    }
}

impl PeerPicker for HttpPool {
    fn pick_peer(&self, key: &str) -> Option<PickedPeer> {
        let owner = self.ring.get(key)?;
        if owner == self.self_url {
            return None;
        }

        let client = self.clients.read().get(&owner)?.clone();
        Some(PickedPeer {
            address: owner,
            client,
        })
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("self_url", &self.self_url)
            .field("base_path", &self.options.base_path)
            .field("ring", &self.ring)
            .finish()
    }
}

fn normalize(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// =============================================================================
// Tests
// =============================================================================
