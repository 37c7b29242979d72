//! Peer Wire Format
//!
//! Protobuf messages exchanged between peers and the URL layout they travel
//! on: `GET <base_url><base_path><namespace>/<key>` with both segments
//! percent-encoded. A successful response is `application/octet-stream`
//! carrying an encoded [`FetchResponse`].

use bytes::Bytes;
use prost::Message;

/// Content type of peer responses
pub const CONTENT_TYPE: &str = "application/octet-stream";

/// Default URL prefix of the peer protocol
pub const DEFAULT_BASE_PATH: &str = "/_peercache/";

/// A request for one key of one namespace
#[derive(Clone, PartialEq, Message)]
pub struct FetchRequest {
    #[prost(string, tag = "1")]
    pub namespace: String,
    #[prost(string, tag = "2")]
    pub key: String,
}

/// The value bytes for a [`FetchRequest`]
#[derive(Clone, PartialEq, Message)]
pub struct FetchResponse {
    #[prost(bytes = "bytes", tag = "1")]
    pub value: Bytes,
}

impl FetchRequest {
    pub fn new(namespace: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            key: key.into(),
        }
    }

    /// Request path under `base_path`, segments percent-encoded
    pub fn path(&self, base_path: &str) -> String {
        format!(
            "{}{}/{}",
            base_path,
            urlencoding::encode(&self.namespace),
            urlencoding::encode(&self.key)
        )
    }

    /// Parse a request path produced by [`FetchRequest::path`].
    ///
    /// Returns `None` if `path` is not under `base_path` or lacks either
    /// segment. The key segment may contain encoded slashes.
    pub fn from_path(base_path: &str, path: &str) -> Option<Self> {
        let rest = path.strip_prefix(base_path)?;
        let (namespace, key) = rest.split_once('/')?;
        if namespace.is_empty() {
            return None;
        }

        Some(Self {
            namespace: urlencoding::decode(namespace).ok()?.into_owned(),
            key: urlencoding::decode(key).ok()?.into_owned(),
        })
    }
}

impl FetchResponse {
    /// Encode `value` as a response body
    pub fn encode_value(value: Bytes) -> Bytes {
        Bytes::from(Self { value }.encode_to_vec())
    }

    /// Decode a response body back into the value bytes
    pub fn decode_value(body: Bytes) -> Result<Bytes, prost::DecodeError> {
        Self::decode(body).map(|response| response.value)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_layout() {
        let request = FetchRequest::new("scores", "Tom");
        assert_eq!(request.path(DEFAULT_BASE_PATH), "/_peercache/scores/Tom");
    }

    #[test]
    fn test_path_escapes_segments() {
        let request = FetchRequest::new("user data", "a/b?c");
        let path = request.path(DEFAULT_BASE_PATH);

        assert_eq!(path, "/_peercache/user%20data/a%2Fb%3Fc");
        assert_eq!(FetchRequest::from_path(DEFAULT_BASE_PATH, &path), Some(request));
    }

    #[test]
    fn test_from_path_rejects_foreign_paths() {
        assert_eq!(FetchRequest::from_path(DEFAULT_BASE_PATH, "/healthz"), None);
        assert_eq!(FetchRequest::from_path(DEFAULT_BASE_PATH, "/_peercache/scores"), None);
        assert_eq!(FetchRequest::from_path(DEFAULT_BASE_PATH, "/_peercache//key"), None);
    }

    #[test]
    fn test_from_path_allows_empty_key() {
        let request = FetchRequest::from_path(DEFAULT_BASE_PATH, "/_peercache/scores/").unwrap();
        assert_eq!(request.namespace, "scores");
        assert_eq!(request.key, "");
    }

    #[test]
    fn test_response_body() {
        let body = FetchResponse::encode_value(Bytes::from_static(b"630"));
        // field 1, length-delimited, 3 bytes
        assert_eq!(&body[..], &[0x0a, 0x03, b'6', b'3', b'0']);
        assert_eq!(FetchResponse::decode_value(body).unwrap(), Bytes::from_static(b"630"));
    }

    #[test]
    fn test_malformed_response_body() {
        assert!(FetchResponse::decode_value(Bytes::from_static(&[0x0a, 0x09, 0x01])).is_err());
    }
}
