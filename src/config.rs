//! Node Configuration
//!
//! YAML description of one node: where it listens, how peers reach it, the
//! peer list and the namespaces it hosts.
//!
//! ```yaml
//! listen: 0.0.0.0:8001
//! self_url: http://10.0.0.1:8001
//! peers:
//!   - http://10.0.0.1:8001
//!   - http://10.0.0.2:8001
//! pool:
//!   replicas: 50
//!   request_timeout_secs: 5
//! namespaces:
//!   - name: scores
//!     cache_bytes: 2048
//!     source:
//!       Tom: "630"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::adapters::wire::DEFAULT_BASE_PATH;
use crate::adapters::{HttpPool, InMemorySource, PoolOptions};
use crate::error::{Error, Result};
use crate::namespace::Registry;
use crate::ring;
use crate::server::NodeState;

fn default_listen() -> String {
    "0.0.0.0:8001".to_string()
}

fn default_base_path() -> String {
    DEFAULT_BASE_PATH.to_string()
}

fn default_replicas() -> usize {
    ring::DEFAULT_REPLICAS
}

fn default_request_timeout_secs() -> u64 {
    5
}

/// Configuration of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    /// Socket address the HTTP server binds
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Base URL other peers use to reach this node
    pub self_url: String,

    /// Base URLs of every node, this one included. Empty means no peers.
    #[serde(default)]
    pub peers: Vec<String>,

    /// Peer routing options
    #[serde(default)]
    pub pool: PoolConfig,

    /// Namespaces hosted by this node
    #[serde(default)]
    pub namespaces: Vec<NamespaceConfig>,
}

/// Peer routing options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolConfig {
    /// URL prefix of the peer protocol
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Virtual nodes per peer
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Timeout of a single peer fetch
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            replicas: default_replicas(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// One hosted namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceConfig {
    pub name: String,

    /// Local shard capacity in bytes (0 = unbounded)
    #[serde(default)]
    pub cache_bytes: u64,

    /// Authoritative key/value data served on misses
    #[serde(default)]
    pub source: BTreeMap<String, String>,
}

impl NodeConfig {
    /// Load and validate a YAML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&yaml)
    }

    /// Parse and validate YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the node cannot run with
    pub fn validate(&self) -> Result<()> {
        self.listen_addr()?;

        if self.self_url.trim().is_empty() {
            return Err(Error::Config("self_url must not be empty".to_string()));
        }
        if self.pool.replicas == 0 {
            return Err(Error::Config("pool.replicas must be greater than 0".to_string()));
        }
        if self.pool.request_timeout_secs == 0 {
            return Err(Error::Config(
                "pool.request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !self.pool.base_path.starts_with('/') || !self.pool.base_path.ends_with('/') {
            return Err(Error::Config(format!(
                "pool.base_path must start and end with '/': {}",
                self.pool.base_path
            )));
        }

        let mut names = HashSet::new();
        for namespace in &self.namespaces {
            if namespace.name.is_empty() {
                return Err(Error::Config("namespace name must not be empty".to_string()));
            }
            if !names.insert(namespace.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate namespace: {}",
                    namespace.name
                )));
            }
        }

        Ok(())
    }

    /// Parsed `listen` address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen
            .parse()
            .map_err(|e| Error::Config(format!("Invalid listen address {}: {}", self.listen, e)))
    }

    /// Options for the peer pool
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            base_path: self.pool.base_path.clone(),
            replicas: self.pool.replicas,
            request_timeout: Duration::from_secs(self.pool.request_timeout_secs),
            ..PoolOptions::default()
        }
    }

    /// Build the registry, the peer pool and the namespaces this node hosts.
    ///
    /// This node is always on its own ring, whether or not `peers` lists it.
    pub fn build(&self) -> Result<NodeState> {
        let registry = Arc::new(Registry::new());
        let pool = Arc::new(HttpPool::new(self.self_url.as_str(), self.pool_options())?);

        if !self.peers.is_empty() {
            pool.add_peers(&self.peers);
            pool.add_peers(&[self.self_url.as_str()]);
        }

        for namespace in &self.namespaces {
            let source: InMemorySource = namespace
                .source
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            let mut builder = registry
                .namespace(namespace.name.as_str())
                .cache_bytes(namespace.cache_bytes)
                .loader(source);
            if !self.peers.is_empty() {
                builder = builder.peers(pool.clone());
            }
            builder.register()?;
        }

        info!(
            self_url = %pool.self_url(),
            peers = pool.peers().len(),
            namespaces = registry.len(),
            "Node configured"
        );

        Ok(NodeState::with_pool(registry, pool))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MINIMAL: &str = "self_url: http://127.0.0.1:8001\n";

    const FULL: &str = r#"
listen: 127.0.0.1:9001
self_url: http://127.0.0.1:9001
peers:
  - http://127.0.0.1:9001
  - http://127.0.0.1:9002
pool:
  base_path: /_cache/
  replicas: 10
  request_timeout_secs: 2
namespaces:
  - name: scores
    cache_bytes: 2048
    source:
      Tom: "630"
      Jack: "589"
  - name: users
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = NodeConfig::from_yaml_str(MINIMAL).unwrap();

        assert_eq!(config.listen, "0.0.0.0:8001");
        assert!(config.peers.is_empty());
        assert_eq!(config.pool, PoolConfig::default());
        assert_eq!(config.pool.base_path, "/_peercache/");
        assert_eq!(config.pool.replicas, 50);
        assert!(config.namespaces.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = NodeConfig::from_yaml_str(FULL).unwrap();

        assert_eq!(config.listen_addr().unwrap().port(), 9001);
        assert_eq!(config.peers.len(), 2);
        assert_eq!(config.namespaces.len(), 2);
        assert_eq!(config.namespaces[0].source["Tom"], "630");
        assert_eq!(config.namespaces[1].cache_bytes, 0);

        let options = config.pool_options();
        assert_eq!(options.base_path, "/_cache/");
        assert_eq!(options.replicas, 10);
        assert_eq!(options.request_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_configs() {
        let cases = [
            "self_url: ''\n",
            "listen: nowhere\nself_url: http://a\n",
            "self_url: http://a\npool:\n  replicas: 0\n",
            "self_url: http://a\npool:\n  request_timeout_secs: 0\n",
            "self_url: http://a\npool:\n  base_path: cache\n",
            "self_url: http://a\nnamespaces:\n  - name: x\n  - name: x\n",
            "self_url: http://a\nnamespaces:\n  - name: ''\n",
            "self_url: http://a\nunknown: 1\n",
            "peers: []\n",
        ];

        for yaml in cases {
            assert_matches!(NodeConfig::from_yaml_str(yaml), Err(Error::Config(_)), "{}", yaml);
        }
    }

    #[test]
    fn test_from_missing_path() {
        assert_matches!(
            NodeConfig::from_path("/nonexistent/peercache.yaml"),
            Err(Error::Config(_))
        );
    }

    #[tokio::test]
    async fn test_build_node() {
        let config = NodeConfig::from_yaml_str(FULL).unwrap();
        let state = config.build().unwrap();

        assert_eq!(state.registry().names(), vec!["scores", "users"]);
        let scores = state.registry().lookup("scores").unwrap();
        assert!(scores.has_peers());
        assert_eq!(scores.cache().capacity(), 2048);
    }

    #[tokio::test]
    async fn test_build_standalone_node_serves_locally() {
        let yaml = "self_url: http://127.0.0.1:8001\nnamespaces:\n  - name: scores\n    source:\n      Tom: '630'\n";
        let state = NodeConfig::from_yaml_str(yaml).unwrap().build().unwrap();

        let scores = state.registry().lookup("scores").unwrap();
        assert!(!scores.has_peers());
        assert_eq!(scores.get("Tom").await.unwrap().to_string(), "630");
    }
}
