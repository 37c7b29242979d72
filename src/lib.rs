//! Peercache - Peer-Distributed Read-Through Cache
//!
//! An embeddable cache whose nodes cooperate as peers. Every key has exactly
//! one owner on a consistent-hash ring; a miss anywhere is forwarded to the
//! owner, and only the owner asks the authoritative source. Concurrent misses
//! for the same key collapse into a single load.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   miss    ┌──────────────┐   not owner   ┌──────────────┐
//! │  Namespace   │──────────▶│  Coalescer   │──────────────▶│  Peer (HTTP) │
//! │  (LRU shard) │           │ (one load    │               └──────────────┘
//! └──────────────┘           │  per key)    │   owner / peer failed
//!                            └──────────────┘──────────────▶ Loader (source)
//! ```
//!
//! # Modules
//!
//! - [`cache`] - Byte-bounded LRU shard and immutable byte views
//! - [`ring`] - Consistent hash ring with virtual nodes
//! - [`coalesce`] - Request coalescing for concurrent misses
//! - [`domain`] - Ports: loaders and peer routing
//! - [`namespace`] - Namespaces and the process-wide registry
//! - [`adapters`] - HTTP peer pool, peer client, wire format, in-memory source
//! - [`server`] - HTTP server: peer protocol, client API, health and metrics
//! - [`config`] - YAML node configuration
//! - [`error`] - Error types

pub mod adapters;
pub mod cache;
pub mod coalesce;
pub mod config;
pub mod domain;
pub mod error;
pub mod namespace;
pub mod ring;
pub mod server;

// Re-export commonly used types
pub use adapters::{HttpPool, InMemorySource, PoolOptions};
pub use cache::{BoundedCache, ByteView};
pub use coalesce::Coalescer;
pub use config::NodeConfig;
pub use domain::{Loader, LoaderFn, PeerClient, PeerPicker, PickedPeer};
pub use error::{Error, Result};
pub use namespace::{Namespace, Registry};
pub use ring::HashRing;
