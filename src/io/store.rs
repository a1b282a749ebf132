//! Object storage collaborator contract.
//!
//! The server only needs two operations from its storage backend: a HEAD that
//! reports size and change token, and a GET that optionally takes a byte range.
//! Raw archive responses use a streaming variant of the GET so the body is
//! never held in memory as a whole.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};

use crate::error::IoError;

/// A half-open byte range `[offset, offset + length)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    /// First byte of the range
    pub offset: u64,

    /// Number of bytes in the range
    pub length: u64,
}

impl ByteRange {
    /// Create a new byte range.
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    /// Create a range from inclusive `start` and `end` positions.
    pub fn from_inclusive(start: u64, end: u64) -> Self {
        Self {
            offset: start,
            length: end - start + 1,
        }
    }

    /// Exclusive end position.
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Inclusive position of the last byte, as used in `Content-Range`.
    pub fn last(&self) -> u64 {
        self.end().saturating_sub(1)
    }
}

/// Size and change token of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Total object size in bytes
    pub size: u64,

    /// Change token (ETag) reported by the backend, if any
    pub etag: Option<String>,
}

/// Body of a GET, with the object's total size and change token.
#[derive(Debug, Clone)]
pub struct ObjectData {
    /// The requested bytes
    pub data: Bytes,

    /// Total object size (not the length of `data` for ranged reads)
    pub size: u64,

    /// Change token (ETag) reported by the backend, if any
    pub etag: Option<String>,
}

/// Chunked body of a streaming GET.
pub type ObjectBody = BoxStream<'static, Result<Bytes, IoError>>;

/// A streaming GET: the body is pulled chunk by chunk as it is sent on.
pub struct ObjectStream {
    /// Body chunks, in order
    pub body: ObjectBody,

    /// Number of bytes the body will yield
    pub length: u64,

    /// Total object size (not `length` for ranged reads)
    pub size: u64,

    /// Change token (ETag) reported by the backend, if any
    pub etag: Option<String>,
}

impl From<ObjectData> for ObjectStream {
    fn from(object: ObjectData) -> Self {
        let ObjectData { data, size, etag } = object;
        Self {
            length: data.len() as u64,
            body: stream::once(async move { Ok(data) }).boxed(),
            size,
            etag,
        }
    }
}

/// Range-addressable object storage.
///
/// Both operations fail with [`IoError::NotFound`] when the object is absent
/// and with another [`IoError`] variant on backend faults. Implementations do
/// not retry.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch size and change token without reading the body.
    async fn head(&self, key: &str) -> Result<ObjectInfo, IoError>;

    /// Fetch the whole object, or only `range` when given.
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectData, IoError>;

    /// Like [`ObjectStore::get`], but hands the body back as a stream.
    ///
    /// The default buffers through `get`; backends that can stream override it.
    async fn get_stream(
        &self,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<ObjectStream, IoError> {
        Ok(self.get(key, range).await?.into())
    }

    /// Human-readable location of `key`, used in logs and error messages.
    fn location(&self, key: &str) -> String;
}
