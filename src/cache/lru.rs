//! Byte-Bounded LRU
//!
//! Single-threaded least-recently-used map whose capacity is expressed in
//! bytes rather than entries. Callers provide their own synchronization; see
//! [`BoundedCache`](super::BoundedCache) for the thread-safe wrapper.

use std::sync::Arc;

use linked_hash_map::LinkedHashMap;

/// Values that know how many bytes they account for.
pub trait ByteLen {
    /// Number of bytes charged against the cache capacity.
    fn byte_len(&self) -> u64;
}

impl ByteLen for String {
    fn byte_len(&self) -> u64 {
        self.len() as u64
    }
}

impl ByteLen for Vec<u8> {
    fn byte_len(&self) -> u64 {
        self.len() as u64
    }
}

/// Invoked with every entry leaving the cache.
pub type EvictionCallback<V> = Arc<dyn Fn(&str, &V) + Send + Sync>;

/// Least-recently-used cache bounded by the summed size of its entries.
///
/// The size of an entry is `key.len() + value.byte_len()`. A `max_bytes` of
/// zero disables eviction entirely.
pub struct LruCache<V: ByteLen> {
    /// Maximum size in bytes (0 = unbounded)
    max_bytes: u64,
    /// Current size in bytes
    current_bytes: u64,
    /// Number of entries evicted to honor `max_bytes`
    evictions: u64,
    /// Entries, least recently used first
    map: LinkedHashMap<String, V>,
    /// Called for every evicted or removed entry
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V: ByteLen> LruCache<V> {
    /// Create an empty cache holding at most `max_bytes`
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            current_bytes: 0,
            evictions: 0,
            map: LinkedHashMap::new(),
            on_evicted: None,
        }
    }

    /// Create an empty cache that reports evicted entries to `on_evicted`
    pub fn with_eviction_callback(max_bytes: u64, on_evicted: EvictionCallback<V>) -> Self {
        Self {
            on_evicted: Some(on_evicted),
            ..Self::new(max_bytes)
        }
    }

    #[inline]
    fn entry_size(key: &str, value: &V) -> u64 {
        key.len() as u64 + value.byte_len()
    }

    /// Look up a key and mark it most recently used
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.map.get_refresh(key).map(|value| &*value)
    }

    /// Look up a key without touching its recency
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    /// Check if a key is present
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Insert or replace an entry, then evict until the cache fits again.
    ///
    /// Replacing moves the entry to the most recently used position and
    /// charges only the difference between the old and the new value.
    pub fn add(&mut self, key: String, value: V) {
        let key_len = key.len() as u64;
        let value_len = value.byte_len();

        match self.map.insert(key, value) {
            Some(old) => {
                self.current_bytes = self.current_bytes - old.byte_len() + value_len;
            }
            None => {
                self.current_bytes += key_len + value_len;
            }
        }

        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        while self.max_bytes != 0 && self.current_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Evict the least recently used entry
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let (key, value) = self.map.pop_front()?;
        self.current_bytes -= Self::entry_size(&key, &value);
        self.evictions += 1;

        if let Some(on_evicted) = &self.on_evicted {
            on_evicted(&key, &value);
        }

        Some((key, value))
    }

    /// Remove an entry by key
    pub fn remove(&mut self, key: &str) -> Option<V> {
        let value = self.map.remove(key)?;
        self.current_bytes -= Self::entry_size(key, &value);

        if let Some(on_evicted) = &self.on_evicted {
            on_evicted(key, &value);
        }

        Some(value)
    }

    /// Drop every entry, reporting each one to the eviction callback
    pub fn clear(&mut self) {
        while let Some((key, value)) = self.map.pop_front() {
            if let Some(on_evicted) = &self.on_evicted {
                on_evicted(&key, &value);
            }
        }
        self.current_bytes = 0;
    }

    /// Keys from least to most recently used
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Current size in bytes
    pub fn size_bytes(&self) -> u64 {
        self.current_bytes
    }

    /// Configured maximum size in bytes
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Number of capacity-driven evictions so far
    pub fn evictions(&self) -> u64 {
        self.evictions
    }
}

impl<V: ByteLen> std::fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("max_bytes", &self.max_bytes)
            .field("current_bytes", &self.current_bytes)
            .field("entries", &self.map.len())
            .field("evictions", &self.evictions)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
