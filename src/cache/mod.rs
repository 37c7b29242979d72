//! Local Cache Shard
//!
//! The per-namespace, in-process store that every node keeps for the keys it
//! owns.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       BoundedCache                           │
//! │      RwLock<Option<LruCache<ByteView>>> (lazy allocation)    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  LruCache                                                    │
//! │  ┌──────────┐   ┌──────────┐   ┌──────────┐                  │
//! │  │ LRU end  │ → │   ...    │ → │ MRU end  │  LinkedHashMap   │
//! │  └──────────┘   └──────────┘   └──────────┘                  │
//! │  size = Σ key.len() + value.len()   evict while size > cap   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design
//!
//! - Entry size is `key.len() + value.len()`; capacity `0` means unbounded
//! - Values are [`ByteView`]s: cheap to clone, impossible to mutate
//! - Eviction is pure LRU, never size- or key-ordered

mod bounded;
mod byteview;
mod lru;

#[cfg(test)]
mod proptest;

pub use bounded::BoundedCache;
pub use byteview::ByteView;
pub use lru::{ByteLen, EvictionCallback, LruCache};

/// One byte
pub const B: u64 = 1;

/// One kibibyte
pub const KB: u64 = 1 << 10;

/// One mebibyte
pub const MB: u64 = 1 << 20;

/// One gibibyte
pub const GB: u64 = 1 << 30;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_units() {
        assert_eq!(B, 1);
        assert_eq!(KB, 1024);
        assert_eq!(MB, 1024 * 1024);
        assert_eq!(GB, 1024 * 1024 * 1024);
    }
}
