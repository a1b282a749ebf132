use std::num::NonZeroUsize;
use std::sync::Arc;

use tracing::info;

use super::cache::ArchiveIdentity;
use super::reader::ArchiveReader;
use crate::error::ArchiveError;
use crate::format::ArchiveHeader;
use crate::io::{ObjectRangeReader, ObjectStore, RangeReader};

/// Everything needed to serve tiles from one archive version.
///
/// The reader is pinned to the ETag in `identity`; any read that observes a
/// different ETag fails with `ArchiveChanged` instead of mixing versions.
pub struct CachedArchiveState<S> {
    identity: ArchiveIdentity,
    reader: ObjectRangeReader<S>,
    archive: ArchiveReader,
}

impl<S: ObjectStore> CachedArchiveState<S> {
    /// HEAD the object, then read its header and root directory.
    pub async fn load(
        store: Arc<S>,
        key: &str,
        leaf_cache_capacity: NonZeroUsize,
    ) -> Result<Self, ArchiveError> {
        let reader = ObjectRangeReader::open(store, key).await?;
        let archive = ArchiveReader::open(&reader, leaf_cache_capacity).await?;
        let identity = ArchiveIdentity::new(key, reader.etag().map(str::to_string));

        info!(
            archive = reader.identifier(),
            etag = reader.etag().unwrap_or("-"),
            size = reader.size(),
            "Loaded archive index"
        );

        Ok(Self {
            identity,
            reader,
            archive,
        })
    }

    /// Identity this state was loaded for.
    pub fn identity(&self) -> &ArchiveIdentity {
        &self.identity
    }

    /// Pinned reader for the archive object.
    pub fn reader(&self) -> &ObjectRangeReader<S> {
        &self.reader
    }

    /// Decoded header, root directory and leaf cache.
    pub fn archive(&self) -> &ArchiveReader {
        &self.archive
    }

    /// Shorthand for `self.archive().header()`.
    pub fn header(&self) -> &ArchiveHeader {
        self.archive.header()
    }

    /// Size of the archive object in bytes.
    pub fn size(&self) -> u64 {
        self.reader.size()
    }
}
