use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::store::{ByteRange, ObjectInfo, ObjectStore};
use super::RangeReader;
use crate::error::IoError;

/// [`RangeReader`] over one object in an [`ObjectStore`].
///
/// The reader is pinned to the size and ETag observed when it was created.
/// Every response is checked against that ETag, so a reader never mixes bytes
/// from two versions of the object.
pub struct ObjectRangeReader<S> {
    store: Arc<S>,
    key: String,
    size: u64,
    etag: Option<String>,
    identifier: String,
}

impl<S: ObjectStore> ObjectRangeReader<S> {
    /// Create a reader from an already known size and change token.
    pub fn new(store: Arc<S>, key: impl Into<String>, info: &ObjectInfo) -> Self {
        let key = key.into();
        let identifier = store.location(&key);
        Self {
            store,
            key,
            size: info.size,
            etag: info.etag.clone(),
            identifier,
        }
    }

    /// Create a reader by issuing a HEAD for the object.
    ///
    /// Returns an error if the object does not exist or is inaccessible.
    pub async fn open(store: Arc<S>, key: impl Into<String>) -> Result<Self, IoError> {
        let key = key.into();
        let info = store.head(&key).await?;
        Ok(Self::new(store, key, &info))
    }

    /// Get the ETag this reader is pinned to.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }
}

#[async_trait]
impl<S: ObjectStore> RangeReader for ObjectRangeReader<S> {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        let requested = len as u64;
        if offset.checked_add(requested).map_or(true, |end| end > self.size) {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested,
                size: self.size,
            });
        }

        if len == 0 {
            return Ok(Bytes::new());
        }

        let object = self
            .store
            .get(&self.key, Some(ByteRange::new(offset, requested)))
            .await?;

        if let (Some(expected), Some(actual)) = (&self.etag, &object.etag) {
            if expected != actual {
                return Err(IoError::ArchiveChanged {
                    expected: expected.clone(),
                    actual: actual.clone(),
                });
            }
        }

        if object.data.len() != len {
            return Err(IoError::ShortRead {
                offset,
                expected: requested,
                actual: object.data.len() as u64,
            });
        }

        Ok(object.data)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}
