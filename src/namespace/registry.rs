//! Namespace Registry
//!
//! Name → namespace map shared by the whole process. Built once by the entry
//! point and passed by handle to whoever needs lookups.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use super::Namespace;
use crate::cache::{ByteView, EvictionCallback};
use crate::domain::ports::{Loader, PeerPicker};
use crate::error::{Error, Result};

/// Registry of namespaces by name
#[derive(Default)]
pub struct Registry {
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a namespace called `name`
    pub fn namespace(&self, name: impl Into<String>) -> NamespaceBuilder<'_> {
        NamespaceBuilder {
            registry: self,
            name: name.into(),
            cache_bytes: 0,
            loader: None,
            peers: None,
            on_evicted: None,
        }
    }

    /// Register an already built namespace.
    ///
    /// Fails with [`Error::NamespaceExists`] if the name is taken.
    pub fn insert(&self, namespace: Namespace) -> Result<Arc<Namespace>> {
        let mut namespaces = self.namespaces.write();
        if namespaces.contains_key(namespace.name()) {
            return Err(Error::NamespaceExists(namespace.name().to_string()));
        }

        let namespace = Arc::new(namespace);
        namespaces.insert(namespace.name().to_string(), namespace.clone());
        info!(
            namespace = %namespace.name(),
            cache_bytes = namespace.cache().capacity(),
            "Namespace registered"
        );

        Ok(namespace)
    }

    /// Get a namespace by name
    pub fn get(&self, name: &str) -> Option<Arc<Namespace>> {
        self.namespaces.read().get(name).cloned()
    }

    /// Get a namespace by name, failing with [`Error::NamespaceNotFound`]
    pub fn lookup(&self, name: &str) -> Result<Arc<Namespace>> {
        self.get(name)
            .ok_or_else(|| Error::NamespaceNotFound(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// All namespaces, sorted by name
    pub fn namespaces(&self) -> Vec<Arc<Namespace>> {
        let mut namespaces: Vec<Arc<Namespace>> =
            self.namespaces.read().values().cloned().collect();
        namespaces.sort_by(|a, b| a.name().cmp(b.name()));
        namespaces
    }

    /// Number of registered namespaces
    pub fn len(&self) -> usize {
        self.namespaces.read().len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.namespaces.read().is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("namespaces", &self.names())
            .finish()
    }
}

/// Builder returned by [`Registry::namespace`]
pub struct NamespaceBuilder<'a> {
    registry: &'a Registry,
    name: String,
    cache_bytes: u64,
    loader: Option<Arc<dyn Loader>>,
    peers: Option<Arc<dyn PeerPicker>>,
    on_evicted: Option<EvictionCallback<ByteView>>,
}

impl NamespaceBuilder<'_> {
    /// Local shard capacity in bytes (0 = unbounded, the default)
    pub fn cache_bytes(mut self, cache_bytes: u64) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    /// Authoritative source for misses (required)
    pub fn loader(mut self, loader: impl Loader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    /// Authoritative source shared with other owners
    pub fn shared_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Peer picker attached right after construction
    pub fn peers(mut self, peers: Arc<dyn PeerPicker>) -> Self {
        self.peers = Some(peers);
        self
    }

    /// Called for every entry leaving the local shard
    pub fn on_evicted(mut self, on_evicted: EvictionCallback<ByteView>) -> Self {
        self.on_evicted = Some(on_evicted);
        self
    }

    /// Build the namespace and register it.
    ///
    /// Fails with [`Error::Config`] for an empty name or a missing loader and
    /// with [`Error::NamespaceExists`] for a duplicate name.
    pub fn register(self) -> Result<Arc<Namespace>> {
        if self.name.is_empty() {
            return Err(Error::Config("namespace name must not be empty".to_string()));
        }
        let loader = self.loader.ok_or_else(|| {
            Error::Config(format!("namespace {} has no loader", self.name))
        })?;

        let namespace = match self.on_evicted {
            Some(on_evicted) => {
                Namespace::with_eviction_callback(self.name, self.cache_bytes, loader, on_evicted)
            }
            None => Namespace::new(self.name, self.cache_bytes, loader),
        };
        if let Some(peers) = self.peers {
            namespace.register_peers(peers)?;
        }

        self.registry.insert(namespace)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{LoaderFn, PickedPeer};
    use assert_matches::assert_matches;
    use bytes::Bytes;

    fn echo() -> impl Loader + 'static {
        LoaderFn::new(|key: String| futures::future::ready(Ok(Bytes::from(key))))
    }

    struct NoPeers;

    impl PeerPicker for NoPeers {
        fn pick_peer(&self, _key: &str) -> Option<PickedPeer> {
            None
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        let ns = registry
            .namespace("scores")
            .cache_bytes(2 << 10)
            .loader(echo())
            .register()
            .unwrap();

        assert_eq!(ns.name(), "scores");
        assert_eq!(ns.cache().capacity(), 2048);
        assert!(Arc::ptr_eq(&registry.get("scores").unwrap(), &ns));
        assert!(registry.get("missing").is_none());
        assert_matches!(
            registry.lookup("missing"),
            Err(Error::NamespaceNotFound(ref name)) if name == "missing"
        );
    }

    #[test]
    fn test_missing_loader_is_config_error() {
        let registry = Registry::new();
        assert_matches!(registry.namespace("scores").register(), Err(Error::Config(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_name_is_config_error() {
        let registry = Registry::new();
        assert_matches!(
            registry.namespace("").loader(echo()).register(),
            Err(Error::Config(_))
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = Registry::new();
        let first = registry.namespace("scores").loader(echo()).register().unwrap();

        assert_matches!(
            registry.namespace("scores").loader(echo()).register(),
            Err(Error::NamespaceExists(ref name)) if name == "scores"
        );
        assert!(Arc::ptr_eq(&registry.get("scores").unwrap(), &first));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_peers_attached_at_build() {
        let registry = Registry::new();
        let ns = registry
            .namespace("scores")
            .loader(echo())
            .peers(Arc::new(NoPeers))
            .register()
            .unwrap();

        assert!(ns.has_peers());
        assert_matches!(
            ns.register_peers(Arc::new(NoPeers)),
            Err(Error::PeersAlreadyRegistered(_))
        );
    }

    #[test]
    fn test_names_sorted() {
        let registry = Registry::new();
        for name in ["users", "scores", "avatars"] {
            registry.namespace(name).loader(echo()).register().unwrap();
        }

        assert_eq!(registry.names(), vec!["avatars", "scores", "users"]);
        let names: Vec<_> = registry
            .namespaces()
            .iter()
            .map(|ns| ns.name().to_string())
            .collect();
        assert_eq!(names, registry.names());
    }

    #[tokio::test]
    async fn test_eviction_callback_reaches_shard() {
        let evicted = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let registry = Registry::new();
        let ns = registry
            .namespace("echo")
            .cache_bytes(8)
            .loader(echo())
            .on_evicted(Arc::new(move |key: &str, _: &ByteView| {
                sink.lock().push(key.to_string())
            }))
            .register()
            .unwrap();

        ns.get("abc").await.unwrap();
        ns.get("xyz").await.unwrap();

        assert_eq!(*evicted.lock(), vec!["abc".to_string()]);
    }

    #[test]
    fn test_concurrent_registration() {
        use std::thread;

        let registry = Arc::new(Registry::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry
                        .namespace(format!("ns-{}", i % 4))
                        .loader(echo())
                        .register()
                        .is_ok()
                })
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(created, 4);
        assert_eq!(registry.len(), 4);
    }
}
