//! Domain Layer
//!
//! Capability traits the cache engine depends on. Concrete sources and peer
//! transports live in [`crate::adapters`].
//!
//! # Usage
//!
//! ```ignore
//! use peercache::domain::ports::{Loader, LoaderFn};
//!
//! let loader = LoaderFn::new(|key: String| async move {
//!     db.fetch(&key).await
//! });
//! registry.namespace("scores").loader(loader).register()?;
//! ```

pub mod ports;

pub use ports::{Loader, LoaderFn, PeerClient, PeerPicker, PickedPeer};
