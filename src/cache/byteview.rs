//! Immutable Byte View
//!
//! Read-only wrapper around a cached payload.

use bytes::Bytes;

use super::lru::ByteLen;

/// An immutable view over a byte payload.
///
/// Cloning a view shares the underlying buffer. Nothing handed out by a view
/// can be used to change the bytes held by the cache: [`ByteView::to_vec`]
/// returns a fresh copy, [`ByteView::as_slice`] is a shared borrow and
/// [`ByteView::bytes`] is itself immutable.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
    data: Bytes,
}

impl ByteView {
    /// Create a view taking ownership of the payload
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// Create a view from a copy of `data`
    pub fn copy_from_slice(data: &[u8]) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
        }
    }

    /// Payload length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Defensive copy of the payload
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    /// Borrow the payload read-only
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the payload (zero-copy)
    #[inline]
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Payload as text, replacing invalid UTF-8
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }
}

impl ByteLen for ByteView {
    #[inline]
    fn byte_len(&self) -> u64 {
        self.data.len() as u64
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Bytes> for ByteView {
    fn from(data: Bytes) -> Self {
        Self { data }
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(data: Vec<u8>) -> Self {
        Self { data: data.into() }
    }
}

impl From<&str> for ByteView {
    fn from(data: &str) -> Self {
        Self::copy_from_slice(data.as_bytes())
    }
}

impl std::fmt::Display for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.data))
    }
}

impl std::fmt::Debug for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteView")
            .field("len", &self.data.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
