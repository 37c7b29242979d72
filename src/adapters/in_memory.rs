//! In-Memory Source Adapter
//!
//! A `Loader` backed by a concurrent map. Serves the values shipped in the
//! node configuration and stands in for a real database in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

use crate::domain::ports::Loader;
use crate::error::{Error, Result};

/// Authoritative key/value source held in memory.
#[derive(Debug, Default)]
pub struct InMemorySource {
    data: DashMap<String, Bytes>,
    /// Number of `load` calls served, found or not
    reads: AtomicU64,
    /// Simulated source latency
    latency: Option<Duration>,
}

impl InMemorySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every load by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Insert or replace a value
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Bytes>) {
        self.data.insert(key.into(), value.into());
    }

    /// Remove a value
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        self.data.remove(key).map(|(_, value)| value)
    }

    /// Number of stored values
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the source holds nothing
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of loads served so far
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }
}

impl<K, V> FromIterator<(K, V)> for InMemorySource
where
    K: Into<String>,
    V: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let source = Self::new();
        for (key, value) in iter {
            source.insert(key, value);
        }
        source
    }
}

#[async_trait]
impl Loader for InMemorySource {
    async fn load(&self, key: &str) -> Result<Bytes> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        // Clone out so no map guard is held by the caller
        let value = self.data.get(key).map(|entry| entry.value().clone());
        match value {
            Some(value) => {
                debug!(key, bytes = value.len(), "Source hit");
                Ok(value)
            }
            None => Err(Error::load(key, "not found")),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn db() -> InMemorySource {
        [("Tom", "630"), ("Jack", "589"), ("Sam", "567")]
            .into_iter()
            .collect()
    }

    #[tokio::test]
    async fn test_load_found() {
        let source = db();
        assert_eq!(source.len(), 3);
        assert_eq!(&source.load("Jack").await.unwrap()[..], b"589");
        assert_eq!(source.reads(), 1);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let source = db();
        assert_matches!(
            source.load("unknown").await,
            Err(Error::Load { ref key, ref reason }) if key == "unknown" && reason == "not found"
        );
        assert_eq!(source.reads(), 1);
    }

    #[tokio::test]
    async fn test_insert_and_remove() {
        let source = InMemorySource::new();
        assert!(source.is_empty());

        source.insert("k", Bytes::from_static(b"v1"));
        source.insert("k", "v2");
        assert_eq!(&source.load("k").await.unwrap()[..], b"v2");

        assert_eq!(source.remove("k"), Some(Bytes::from_static(b"v2")));
        assert!(source.load("k").await.is_err());
    }

    #[tokio::test]
    async fn test_latency() {
        let source = db().with_latency(Duration::from_millis(20));
        let started = std::time::Instant::now();
        source.load("Tom").await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }
}
