//! PMTiles v3 archive format.
//!
//! Everything in this module is pure decoding over byte slices; no I/O
//! happens here. The [`crate::archive`] module drives these decoders with
//! range reads.
//!
//! - [`header`]: the fixed 127-byte header
//! - [`directory`]: varint-encoded root and leaf directories
//! - [`tile_id`]: Hilbert ordering of `(z, x, y)` tile coordinates
//! - [`compression`]: codecs for directories, metadata and tiles

pub mod compression;
pub mod directory;
pub mod header;
pub mod tile_id;

pub use compression::{decompress, MAX_DECOMPRESSED_SIZE};
pub use directory::{Directory, DirectoryEntry};
pub use header::{ArchiveHeader, Compression, TileType, HEADER_SIZE, MAGIC, SPEC_VERSION};
pub use tile_id::{TileCoord, MAX_ZOOM};
