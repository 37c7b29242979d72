//! Consistent Hash Ring
//!
//! Maps keys to node identifiers using virtual nodes for balance.
//!
//! # Design
//!
//! - Each node contributes `replicas` virtual nodes hashed as `"{i}{node}"`
//! - Lookups binary-search for the first virtual node at or after the key's
//!   hash, wrapping to the start of the ring past the last one
//! - Nodes are only ever added; adding one reassigns only the keys that fall
//!   on its new arcs
//! - Ring state sits behind a reader/writer lock so lookups can run while
//!   peers are being added

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

/// Hash function used to place keys and virtual nodes on the ring
pub type HashFn = fn(&[u8]) -> u32;

/// Default number of virtual nodes per physical node
pub const DEFAULT_REPLICAS: usize = 50;

/// CRC-32 (IEEE), the default ring hash
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

#[derive(Debug, Default)]
struct RingState {
    /// Virtual node hashes, sorted ascending
    hashes: Vec<u32>,
    /// Virtual node hash -> node id
    owners: HashMap<u32, String>,
}

/// Consistent hash ring of node identifiers
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    state: RwLock<RingState>,
}

impl HashRing {
    /// Create an empty ring using CRC-32
    pub fn new(replicas: usize) -> Self {
        Self::with_hash(replicas, crc32)
    }

    /// Create an empty ring with a custom hash function
    pub fn with_hash(replicas: usize, hash: HashFn) -> Self {
        Self {
            hash,
            replicas,
            state: RwLock::new(RingState::default()),
        }
    }

    /// Add nodes to the ring.
    ///
    /// A virtual node colliding with an existing hash takes it over.
    pub fn add<I, S>(&self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state.write();

        for node in nodes {
            let node = node.as_ref();
            for i in 0..self.replicas {
                let hash = (self.hash)(format!("{}{}", i, node).as_bytes());
                state.hashes.push(hash);
                state.owners.insert(hash, node.to_string());
            }
        }

        state.hashes.sort_unstable();
    }

    /// Get the node owning `key`, or `None` if the ring is empty
    pub fn get(&self, key: &str) -> Option<String> {
        let state = self.state.read();
        if state.hashes.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let mut index = state.hashes.partition_point(|&h| h < hash);
        if index == state.hashes.len() {
            index = 0;
        }

        state.owners.get(&state.hashes[index]).cloned()
    }

    /// Distinct node ids currently on the ring, sorted
    pub fn nodes(&self) -> Vec<String> {
        let state = self.state.read();
        let nodes: BTreeSet<&String> = state.owners.values().collect();
        nodes.into_iter().cloned().collect()
    }

    /// Number of virtual nodes
    pub fn len(&self) -> usize {
        self.state.read().hashes.len()
    }

    /// Check if the ring has no nodes
    pub fn is_empty(&self) -> bool {
        self.state.read().hashes.is_empty()
    }

    /// Virtual nodes per physical node
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    #[cfg(test)]
    fn is_sorted(&self) -> bool {
        self.state.read().hashes.windows(2).all(|w| w[0] <= w[1])
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl std::fmt::Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("virtual_nodes", &self.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    /// Interprets the input as a decimal number so ring positions are obvious.
    fn digits(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    #[test]
    fn test_ring_empty() {
        let ring = HashRing::new(3);
        assert!(ring.is_empty());
        assert_eq!(ring.get("anything"), None);
        assert!(ring.nodes().is_empty());
    }

    #[test]
    fn test_ring_lookup_and_wraparound() {
        let ring = HashRing::with_hash(3, digits);

        // Virtual nodes: 2, 4, 6, 12, 14, 16, 22, 24, 26
        ring.add(["6", "4", "2"]);
        assert_eq!(ring.len(), 9);

        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")];
        for (key, node) in cases {
            assert_eq!(ring.get(key).as_deref(), Some(node), "key {}", key);
        }

        // Adds 8, 18, 28: only 27 moves
        ring.add(["8"]);
        let cases = [("2", "2"), ("11", "2"), ("23", "4"), ("27", "8")];
        for (key, node) in cases {
            assert_eq!(ring.get(key).as_deref(), Some(node), "key {}", key);
        }
    }

    #[test]
    fn test_ring_deterministic() {
        let ring = HashRing::new(DEFAULT_REPLICAS);
        ring.add(["http://10.0.0.1:8001", "http://10.0.0.2:8001", "http://10.0.0.3:8001"]);

        for i in 0..100 {
            let key = format!("key-{}", i);
            let first = ring.get(&key);
            assert!(first.is_some());
            for _ in 0..5 {
                assert_eq!(ring.get(&key), first);
            }
        }
    }

    #[test]
    fn test_ring_same_config_same_layout() {
        let a = HashRing::new(10);
        let b = HashRing::new(10);
        a.add(["x", "y", "z"]);
        b.add(["z", "y", "x"]);

        for i in 0..200 {
            let key = i.to_string();
            assert_eq!(a.get(&key), b.get(&key));
        }
    }

    #[test]
    fn test_ring_nodes() {
        let ring = HashRing::new(4);
        ring.add(["b", "a"]);
        ring.add(["c"]);
        assert_eq!(ring.nodes(), vec!["a", "b", "c"]);
        assert_eq!(ring.len(), 12);
        assert!(ring.is_sorted());
    }

    #[test]
    fn test_ring_spreads_keys() {
        let ring = HashRing::default();
        ring.add(["node-a", "node-b", "node-c"]);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for i in 0..3000 {
            let node = ring.get(&format!("user:{}", i)).unwrap();
            *counts.entry(node).or_default() += 1;
        }

        assert_eq!(counts.len(), 3);
        assert!(counts.values().all(|&c| c > 300), "{:?}", counts);
    }

    #[test]
    fn test_ring_concurrent_add_and_get() {
        use std::thread;

        let ring = Arc::new(HashRing::new(20));
        ring.add(["seed"]);

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..25 {
                        ring.add([format!("node-{}-{}", t, i)]);
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..4)
            .map(|t| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..2000 {
                        assert!(ring.get(&format!("key-{}-{}", t, i)).is_some());
                    }
                })
            })
            .collect();

        for handle in writers.into_iter().chain(readers) {
            handle.join().unwrap();
        }

        assert_eq!(ring.len(), 20 * 101);
        assert!(ring.is_sorted());
        assert_eq!(ring.nodes().len(), 101);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Property: adding a node moves a key only onto the new node.
        #[test]
        fn prop_adding_node_only_moves_keys_to_it(
            keys in prop::collection::vec("[a-z0-9]{1,12}", 1..100),
            extra in "[a-z]{3,8}",
        ) {
            let ring = HashRing::new(DEFAULT_REPLICAS);
            ring.add(["alpha", "beta", "gamma"]);

            let before: Vec<_> = keys.iter().map(|k| ring.get(k)).collect();
            ring.add([format!("new-{}", extra)]);

            for (key, owner) in keys.iter().zip(before) {
                let after = ring.get(key);
                prop_assert!(
                    after == owner || after.as_deref() == Some(format!("new-{}", extra).as_str()),
                    "key {} moved from {:?} to {:?}", key, owner, after
                );
            }
        }
    }
}
