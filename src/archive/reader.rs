//! Header parsing and directory walking over a [`RangeReader`].
//!
//! An [`ArchiveReader`] holds the decoded header and root directory of one
//! archive. It does not own the byte source: every operation that needs I/O
//! takes the reader as an argument, so the same decoded index can be shared
//! by every request that targets the same archive version.

use std::num::NonZeroUsize;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ArchiveError, TileError};
use crate::format::{
    decompress, ArchiveHeader, Compression, Directory, DirectoryEntry, TileCoord, HEADER_SIZE,
};
use crate::io::{ByteRange, RangeReader};

/// Total number of directory levels a lookup may visit (root + one leaf level).
pub const MAX_DIRECTORY_DEPTH: usize = 2;

/// Default number of decoded leaf directories kept per archive.
pub const DEFAULT_LEAF_CACHE_CAPACITY: usize = 64;

/// Read and validate the archive header.
///
/// Objects shorter than the header are rejected without issuing a read.
pub async fn read_header<R: RangeReader>(reader: &R) -> Result<ArchiveHeader, ArchiveError> {
    if reader.size() < HEADER_SIZE as u64 {
        return Err(ArchiveError::TooSmall {
            required: HEADER_SIZE as u64,
            actual: reader.size(),
        });
    }

    let bytes = reader.read_exact_at(0, HEADER_SIZE).await?;
    ArchiveHeader::parse(&bytes)
}

/// Decoded index of one archive: header, root directory, and leaf cache.
pub struct ArchiveReader {
    header: ArchiveHeader,
    root: Directory,
    leaves: Mutex<LruCache<u64, Arc<Directory>>>,
}

impl ArchiveReader {
    /// Read the header and root directory.
    ///
    /// This issues exactly two range reads.
    pub async fn open<R: RangeReader>(
        reader: &R,
        leaf_cache_capacity: NonZeroUsize,
    ) -> Result<Self, ArchiveError> {
        let header = read_header(reader).await?;
        let root = read_directory(
            reader,
            header.root_directory_offset,
            header.root_directory_length,
            header.internal_compression,
        )
        .await?;

        debug!(
            archive = reader.identifier(),
            root_entries = root.len(),
            min_zoom = header.min_zoom,
            max_zoom = header.max_zoom,
            "Opened archive"
        );

        Ok(Self::from_parts(header, root, leaf_cache_capacity))
    }

    /// Assemble a reader from an already decoded header and root directory.
    pub fn from_parts(
        header: ArchiveHeader,
        root: Directory,
        leaf_cache_capacity: NonZeroUsize,
    ) -> Self {
        Self {
            header,
            root,
            leaves: Mutex::new(LruCache::new(leaf_cache_capacity)),
        }
    }

    /// The decoded header.
    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// The decoded root directory.
    pub fn root(&self) -> &Directory {
        &self.root
    }

    /// Number of leaf directories currently cached.
    pub async fn cached_leaf_count(&self) -> usize {
        self.leaves.lock().await.len()
    }

    /// Resolve a tile coordinate to its absolute byte range in the archive.
    ///
    /// The walk starts at the root directory and follows at most one leaf
    /// pointer. A leaf pointer found inside a leaf directory means the archive
    /// nests deeper than supported and fails as corrupt.
    pub async fn resolve_tile<R: RangeReader>(
        &self,
        reader: &R,
        coord: TileCoord,
    ) -> Result<ByteRange, TileError> {
        if coord.zoom < self.header.min_zoom || coord.zoom > self.header.max_zoom {
            return Err(TileError::ZoomOutOfRange {
                zoom: coord.zoom,
                min_zoom: self.header.min_zoom,
                max_zoom: self.header.max_zoom,
            });
        }

        let tile_id = coord.tile_id();
        let not_found = || TileError::NotFound {
            zoom: coord.zoom,
            x: coord.x,
            y: coord.y,
        };

        let mut leaf: Option<Arc<Directory>> = None;
        for depth in 0..MAX_DIRECTORY_DEPTH {
            let directory = leaf.as_deref().unwrap_or(&self.root);
            let entry = *directory.find(tile_id).ok_or_else(not_found)?;

            if !entry.is_leaf_pointer() {
                let offset = self
                    .header
                    .tile_data_offset
                    .checked_add(entry.offset)
                    .ok_or_else(|| overflow(&entry))?;
                return Ok(ByteRange::new(offset, u64::from(entry.length)));
            }

            if depth + 1 == MAX_DIRECTORY_DEPTH {
                break;
            }
            leaf = Some(self.leaf_directory(reader, &entry).await?);
        }

        Err(ArchiveError::DirectoryTooDeep {
            max_depth: MAX_DIRECTORY_DEPTH,
        }
        .into())
    }

    /// Read a tile payload and undo the archive's tile compression.
    pub async fn read_tile_bytes<R: RangeReader>(
        &self,
        reader: &R,
        range: ByteRange,
    ) -> Result<Bytes, ArchiveError> {
        let data = reader
            .read_exact_at(range.offset, to_len(range.length)?)
            .await?;
        decompress(data, self.header.tile_compression)
    }

    /// Read and decompress the metadata blob.
    ///
    /// An archive without metadata yields an empty buffer.
    pub async fn read_metadata<R: RangeReader>(&self, reader: &R) -> Result<Bytes, ArchiveError> {
        if self.header.metadata_length == 0 {
            return Ok(Bytes::new());
        }
        let data = reader
            .read_exact_at(
                self.header.metadata_offset,
                to_len(self.header.metadata_length)?,
            )
            .await?;
        decompress(data, self.header.internal_compression)
    }

    /// Fetch the leaf directory a pointer entry addresses, using the LRU.
    async fn leaf_directory<R: RangeReader>(
        &self,
        reader: &R,
        pointer: &DirectoryEntry,
    ) -> Result<Arc<Directory>, ArchiveError> {
        let offset = self
            .header
            .leaf_directory_offset
            .checked_add(pointer.offset)
            .ok_or_else(|| overflow(pointer))?;

        if let Some(directory) = self.leaves.lock().await.get(&offset) {
            return Ok(Arc::clone(directory));
        }

        // Lock is not held across the fetch; concurrent misses may decode twice
        let directory = Arc::new(
            read_directory(
                reader,
                offset,
                u64::from(pointer.length),
                self.header.internal_compression,
            )
            .await?,
        );

        debug!(
            archive = reader.identifier(),
            offset,
            entries = directory.len(),
            "Loaded leaf directory"
        );

        self.leaves.lock().await.put(offset, Arc::clone(&directory));
        Ok(directory)
    }
}

/// Fetch, decompress, and decode one directory.
async fn read_directory<R: RangeReader>(
    reader: &R,
    offset: u64,
    length: u64,
    compression: Compression,
) -> Result<Directory, ArchiveError> {
    let data = reader.read_exact_at(offset, to_len(length)?).await?;
    let data = decompress(data, compression)?;
    Directory::decode(&data)
}

fn to_len(length: u64) -> Result<usize, ArchiveError> {
    usize::try_from(length).map_err(|_| {
        ArchiveError::MalformedDirectory(format!("length {length} does not fit in memory"))
    })
}

fn overflow(entry: &DirectoryEntry) -> ArchiveError {
    ArchiveError::MalformedDirectory(format!(
        "offset of entry {} overflows u64",
        entry.tile_id
    ))
}
