//! Infrastructure Adapters
//!
//! Implementations of the domain ports.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Ports                              │
//! │            Loader │ PeerPicker │ PeerClient                     │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  InMemorySource │ HttpPool (ring of peers) │ HttpPeerClient     │
//! │  wire: protobuf messages and URL layout of the peer protocol    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use peercache::adapters::{HttpPool, PoolOptions};
//!
//! let pool = Arc::new(HttpPool::new("http://10.0.0.1:8001", PoolOptions::default())?);
//! pool.add_peers(&["http://10.0.0.1:8001", "http://10.0.0.2:8001"]);
//! namespace.register_peers(pool.clone())?;
//! ```

mod http_client;
mod http_pool;
mod in_memory;
pub mod wire;

pub use http_client::{build_client, HttpPeerClient};
pub use http_pool::{HttpPool, PoolOptions, DEFAULT_REQUEST_TIMEOUT};
pub use in_memory::InMemorySource;
