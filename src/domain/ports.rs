//! Domain Ports
//!
//! The capabilities a namespace consumes. Adapters implement these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Namespace                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │        Loader │ PeerPicker │ PeerClient              │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Adapters                             │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │   InMemorySource │ HttpPool │ HttpPeerClient         │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// =============================================================================
// Loader Port
// =============================================================================

/// Port for the authoritative data source behind a namespace.
///
/// Must be safe to call concurrently for different keys. A namespace never
/// runs two loads for the same key at once.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Fetch the value for `key` from the source of truth.
    async fn load(&self, key: &str) -> Result<Bytes>;
}

/// Adapts an async closure into a [`Loader`].
pub struct LoaderFn<F, Fut> {
    func: F,
    _fut: PhantomData<fn() -> Fut>,
}

impl<F, Fut> LoaderFn<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Bytes>> + Send,
{
    pub fn new(func: F) -> Self {
        Self {
            func,
            _fut: PhantomData,
        }
    }
}

#[async_trait]
impl<F, Fut> Loader for LoaderFn<F, Fut>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Bytes>> + Send,
{
    async fn load(&self, key: &str) -> Result<Bytes> {
        (self.func)(key.to_string()).await
    }
}

// =============================================================================
// Peer Ports
// =============================================================================

/// Port for fetching a value from the peer that owns it.
///
/// Any error is treated by the caller as "peer unavailable".
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetch `key` of `namespace` from the remote peer.
    async fn fetch(&self, namespace: &str, key: &str) -> Result<Bytes>;
}

/// A remote owner resolved by a [`PeerPicker`].
#[derive(Clone)]
pub struct PickedPeer {
    /// Peer address, used for logging
    pub address: String,
    /// Client talking to that peer
    pub client: Arc<dyn PeerClient>,
}

impl std::fmt::Debug for PickedPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickedPeer")
            .field("address", &self.address)
            .finish()
    }
}

/// Port for resolving which peer owns a key.
pub trait PeerPicker: Send + Sync {
    /// The remote owner of `key`, or `None` when this node is authoritative.
    fn pick_peer(&self, key: &str) -> Option<PickedPeer>;
}

// =============================================================================
// Tests
// =============================================================================
