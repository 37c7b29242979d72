//! Bounded Cache - Thread-Safe Local Shard
//!
//! Wraps an [`LruCache`] of [`ByteView`]s behind a reader/writer lock.
//!
//! # Design
//!
//! - The LRU is allocated on the first write; an untouched cache answers every
//!   lookup with a miss without allocating
//! - Lookups hold an upgradable read lock and upgrade to the exclusive lock
//!   only on a hit, where promoting recency mutates the LRU order
//! - The lock is never held across an `.await`

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use super::byteview::ByteView;
use super::lru::{EvictionCallback, LruCache};

/// Capacity-limited, thread-safe LRU store keyed by string.
pub struct BoundedCache {
    /// Maximum size in bytes (0 = unbounded)
    capacity: u64,
    /// Handed to the LRU when it is allocated
    on_evicted: Option<EvictionCallback<ByteView>>,
    /// Lazily allocated storage
    lru: RwLock<Option<LruCache<ByteView>>>,
}

impl BoundedCache {
    /// Create a cache holding at most `capacity` bytes (0 = unbounded)
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            on_evicted: None,
            lru: RwLock::new(None),
        }
    }

    /// Create a cache that reports evictions to `on_evicted`.
    ///
    /// The callback runs while the cache's write lock is held and must not
    /// call back into this cache.
    pub fn with_eviction_callback(capacity: u64, on_evicted: EvictionCallback<ByteView>) -> Self {
        Self {
            capacity,
            on_evicted: Some(on_evicted),
            lru: RwLock::new(None),
        }
    }

    /// Get a value and mark it most recently used
    pub fn get(&self, key: &str) -> Option<ByteView> {
        let guard = self.lru.upgradable_read();
        if !guard.as_ref().is_some_and(|lru| lru.contains(key)) {
            return None;
        }

        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        guard.as_mut()?.get(key).cloned()
    }

    /// Get a value without changing its recency
    pub fn peek(&self, key: &str) -> Option<ByteView> {
        self.lru.read().as_ref()?.peek(key).cloned()
    }

    /// Insert or replace a value, evicting least recently used entries as needed
    pub fn add(&self, key: impl Into<String>, value: ByteView) {
        let mut guard = self.lru.write();
        let lru = guard.get_or_insert_with(|| match &self.on_evicted {
            Some(on_evicted) => LruCache::with_eviction_callback(self.capacity, on_evicted.clone()),
            None => LruCache::new(self.capacity),
        });
        lru.add(key.into(), value);
    }

    /// Remove a value
    pub fn remove(&self, key: &str) -> Option<ByteView> {
        self.lru.write().as_mut()?.remove(key)
    }

    /// Drop every entry
    pub fn clear(&self) {
        if let Some(lru) = self.lru.write().as_mut() {
            lru.clear();
        }
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.lru
            .read()
            .as_ref()
            .is_some_and(|lru| lru.contains(key))
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> Vec<String> {
        self.lru
            .read()
            .as_ref()
            .map(|lru| lru.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.lru.read().as_ref().map_or(0, |lru| lru.len())
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.lru.read().as_ref().map_or(0, |lru| lru.size_bytes())
    }

    /// Number of capacity-driven evictions
    pub fn evictions(&self) -> u64 {
        self.lru.read().as_ref().map_or(0, |lru| lru.evictions())
    }

    /// Get capacity in bytes (0 = unbounded)
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Whether the first write has happened yet
    pub fn is_allocated(&self) -> bool {
        self.lru.read().is_some()
    }

    /// Get utilization (0.0 for unbounded caches)
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size_bytes() as f64 / self.capacity as f64
        }
    }
}

impl Default for BoundedCache {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for BoundedCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("capacity", &self.capacity)
            .field("size_bytes", &self.size_bytes())
            .field("entries", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
