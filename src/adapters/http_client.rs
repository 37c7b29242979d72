//! HTTP Peer Client
//!
//! Implements the `PeerClient` port over HTTP with `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::wire::{FetchRequest, FetchResponse};
use crate::domain::ports::PeerClient;
use crate::error::{Error, Result};

/// Fetches values from one remote peer.
#[derive(Clone)]
pub struct HttpPeerClient {
    /// Peer base URL, e.g. `http://10.0.0.2:8001`
    base_url: String,
    /// Protocol prefix, e.g. `/_peercache/`
    base_path: String,
    client: Client,
}

impl HttpPeerClient {
    /// Create a client with its own connection pool
    pub fn new(
        base_url: impl Into<String>,
        base_path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self::with_client(base_url, base_path, build_client(timeout)?))
    }

    /// Create a client sharing an existing connection pool
    pub fn with_client(
        base_url: impl Into<String>,
        base_path: impl Into<String>,
        client: Client,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            base_path: base_path.into(),
            client,
        }
    }

    /// Peer base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL for `key` of `namespace`
    pub fn url(&self, namespace: &str, key: &str) -> String {
        format!(
            "{}{}",
            self.base_url,
            FetchRequest::new(namespace, key).path(&self.base_path)
        )
    }

    fn connection_error(&self, e: reqwest::Error) -> Error {
        Error::PeerConnection {
            peer: self.base_url.clone(),
            reason: e.to_string(),
        }
    }
}

/// Build the HTTP client used for peer fetches
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))
}

impl std::fmt::Debug for HttpPeerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPeerClient")
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .finish()
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    #[instrument(skip(self), fields(peer = %self.base_url))]
    async fn fetch(&self, namespace: &str, key: &str) -> Result<Bytes> {
        let url = self.url(namespace, key);
        debug!(url = %url, "Fetching from peer");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        if response.status() != StatusCode::OK {
            return Err(Error::PeerStatus {
                peer: self.base_url.clone(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| self.connection_error(e))?;

        FetchResponse::decode_value(body).map_err(|e| Error::PeerResponse {
            peer: self.base_url.clone(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
