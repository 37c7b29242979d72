//! Error types for Peercache

use std::sync::Arc;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Peercache
///
/// Every variant is cheap to clone: a coalesced load hands the same result to
/// the leader and to all of its followers.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The requested key was empty
    #[error("key is required")]
    EmptyKey,

    /// Namespace lookup failed
    #[error("no such namespace: {0}")]
    NamespaceNotFound(String),

    /// A namespace with this name is already registered
    #[error("namespace already registered: {0}")]
    NamespaceExists(String),

    /// A peer picker was attached twice to the same namespace
    #[error("peer picker already registered for namespace: {0}")]
    PeersAlreadyRegistered(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Source Errors
    // =========================================================================
    /// The authoritative source could not produce a value
    #[error("failed to load key {key}: {reason}")]
    Load { key: String, reason: String },

    // =========================================================================
    // Peer Errors
    // =========================================================================
    /// The peer could not be reached
    #[error("peer {peer} unreachable: {reason}")]
    PeerConnection { peer: String, reason: String },

    /// The peer answered with a non-success status
    #[error("peer {peer} returned status {status}")]
    PeerStatus { peer: String, status: u16 },

    /// The peer answered with a body that could not be decoded
    #[error("malformed response from peer {peer}: {reason}")]
    PeerResponse { peer: String, reason: String },

    // =========================================================================
    // Coalescing Errors
    // =========================================================================
    /// The task running a coalesced call died before producing a result
    #[error("in-flight load for key {0} was abandoned")]
    CallAbandoned(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(Arc<std::io::Error>),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a source load failure.
    pub fn load(key: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::Load {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether this error came from talking to a remote peer.
    pub fn is_peer_error(&self) -> bool {
        matches!(
            self,
            Error::PeerConnection { .. } | Error::PeerStatus { .. } | Error::PeerResponse { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}
