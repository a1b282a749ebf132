use thiserror::Error;

use crate::format::Compression;

/// I/O errors that can occur when reading from remote storage
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// Backend returned fewer (or more) bytes than were asked for
    #[error("Short read at offset {offset}: expected {expected} bytes, got {actual}")]
    ShortRead {
        offset: u64,
        expected: u64,
        actual: u64,
    },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// The object changed underneath a pinned reader
    #[error("Archive changed: expected ETag {expected}, storage reported {actual}")]
    ArchiveChanged { expected: String, actual: String },
}

/// Errors raised while decoding an archive.
///
/// Everything except [`ArchiveError::Io`] means the archive bytes themselves
/// are unusable (the `CorruptArchive` class).
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// I/O error while reading the archive
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// Magic bytes are not "PMTiles"
    #[error("Invalid archive magic bytes")]
    InvalidMagic,

    /// Spec version other than the supported one
    #[error("Unsupported archive version: {0} (only version 3 is supported)")]
    UnsupportedVersion(u8),

    /// Object is too small to contain a header
    #[error("Archive too small: need at least {required} bytes, got {actual}")]
    TooSmall { required: u64, actual: u64 },

    /// Unrecognised compression tag in the header
    #[error("Unknown compression tag: {0}")]
    UnknownCompression(u8),

    /// Unrecognised tile type tag in the header
    #[error("Unknown tile type tag: {0}")]
    UnknownTileType(u8),

    /// Header zoom bounds are inverted
    #[error("Invalid zoom bounds: min zoom {min_zoom} > max zoom {max_zoom}")]
    InvalidZoomBounds { min_zoom: u8, max_zoom: u8 },

    /// Compression declared by the archive that this server cannot decode
    #[error("Unsupported compression: {0}")]
    UnsupportedCompression(Compression),

    /// Codec failed on the given bytes
    #[error("Decompression failed: {0}")]
    Decompression(String),

    /// Directory bytes could not be decoded
    #[error("Malformed directory: {0}")]
    MalformedDirectory(String),

    /// Directory entries are unsorted or their intervals overlap
    #[error("Inconsistent directory: entry for tile {tile_id} overlaps or precedes entry ending at {previous_end}")]
    InconsistentDirectory { tile_id: u64, previous_end: u64 },

    /// Leaf pointer found inside a leaf directory
    #[error("Directory nesting exceeds {max_depth} levels")]
    DirectoryTooDeep { max_depth: usize },

    /// Metadata blob is not a JSON document
    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),
}

impl ArchiveError {
    /// Returns `true` if this error reports a changed archive identity.
    pub fn is_archive_changed(&self) -> bool {
        matches!(self, ArchiveError::Io(IoError::ArchiveChanged { .. }))
    }
}

/// Errors that can occur when resolving or reading a tile
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// No directory entry covers the tile
    #[error("Tile not found: {zoom}/{x}/{y}")]
    NotFound { zoom: u8, x: u32, y: u32 },

    /// Zoom level outside the archive's declared bounds
    #[error("Zoom {zoom} is outside the archive range {min_zoom}-{max_zoom}")]
    ZoomOutOfRange { zoom: u8, min_zoom: u8, max_zoom: u8 },

    /// Column/row outside `[0, 2^zoom)` or zoom beyond the codec limit
    #[error("Tile coordinates {zoom}/{x}/{y} are out of range")]
    CoordinateOutOfRange { zoom: u8, x: u64, y: u64 },

    /// Tile identifier beyond the largest encodable zoom
    #[error("Tile id {0} is out of range")]
    TileIdOutOfRange(u64),

    /// The archive could not be read or decoded
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl From<IoError> for TileError {
    fn from(err: IoError) -> Self {
        TileError::Archive(ArchiveError::Io(err))
    }
}

impl TileError {
    /// Returns `true` if this error reports a changed archive identity.
    pub fn is_archive_changed(&self) -> bool {
        matches!(self, TileError::Archive(e) if e.is_archive_changed())
    }
}

/// Errors for `Range` request headers on the raw archive endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    /// Header does not match `bytes=<start>-<end?>`
    #[error("Malformed range header: {0}")]
    Malformed(String),

    /// Range does not satisfy `start <= end < total`
    #[error("Range {start}-{end} is not satisfiable for {total} bytes")]
    Unsatisfiable { start: u64, end: u64, total: u64 },
}
