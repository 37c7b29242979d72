//! Property-Based Tests for the Local Cache
//!
//! # Test Properties
//!
//! 1. **Byte Accounting**: size always equals Σ key.len() + value.len()
//! 2. **Capacity Bound**: size never exceeds a non-zero capacity after a write
//! 3. **LRU Survivor**: the most recently written key is kept whenever it fits

#![cfg(test)]

use proptest::prelude::*;

use super::{BoundedCache, ByteView, LruCache};

/// Strategy for a sequence of (key, value length) writes over a small key space
/// so that replacements happen regularly.
fn writes_strategy() -> impl Strategy<Value = Vec<(String, usize)>> {
    prop::collection::vec(("[a-f]{1,3}", 0usize..40), 1..200)
}

fn accounted_size(lru: &LruCache<ByteView>) -> u64 {
    lru.keys()
        .map(|key| key.len() as u64 + lru.peek(key).map_or(0, |v| v.len() as u64))
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: after every add the tracked size is exact and within capacity.
    #[test]
    fn prop_size_invariant(
        capacity in 1u64..256,
        writes in writes_strategy(),
    ) {
        let mut lru = LruCache::new(capacity);

        for (key, len) in writes {
            lru.add(key, ByteView::from(vec![0u8; len]));

            prop_assert!(lru.size_bytes() <= capacity);
            prop_assert_eq!(lru.size_bytes(), accounted_size(&lru));
        }
    }

    /// Property: an unbounded cache keeps every distinct key.
    #[test]
    fn prop_unbounded_keeps_everything(writes in writes_strategy()) {
        let mut lru = LruCache::new(0);
        let mut distinct = std::collections::HashSet::new();

        for (key, len) in writes {
            distinct.insert(key.clone());
            lru.add(key, ByteView::from(vec![1u8; len]));
        }

        prop_assert_eq!(lru.len(), distinct.len());
        prop_assert_eq!(lru.evictions(), 0);
        prop_assert_eq!(lru.size_bytes(), accounted_size(&lru));
    }

    /// Property: the last written entry survives if it fits on its own.
    #[test]
    fn prop_last_write_survives(
        capacity in 8u64..256,
        writes in writes_strategy(),
    ) {
        let cache = BoundedCache::new(capacity);
        let mut last = None;

        for (key, len) in writes {
            let fits = key.len() as u64 + len as u64 <= capacity;
            cache.add(key.clone(), ByteView::from(vec![2u8; len]));
            last = Some((key, len, fits));
        }

        if let Some((key, len, fits)) = last {
            if fits {
                prop_assert_eq!(cache.peek(&key).map(|v| v.len()), Some(len));
            } else {
                prop_assert!(cache.peek(&key).is_none());
            }
        }
    }
}
