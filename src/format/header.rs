//! PMTiles v3 header parsing.
//!
//! # Header Structure (127 bytes, little-endian)
//!
//! ```text
//! Bytes   0-6:   Magic "PMTiles"
//! Byte      7:   Spec version (3)
//! Bytes  8-23:   Root directory offset, length
//! Bytes 24-39:   Metadata offset, length
//! Bytes 40-55:   Leaf directories offset, length
//! Bytes 56-71:   Tile data offset, length
//! Bytes 72-95:   Addressed tiles, tile entries, tile contents counts
//! Byte     96:   Clustered flag
//! Bytes 97-99:   Internal compression, tile compression, tile type
//! Bytes 100-101: Min zoom, max zoom
//! Bytes 102-117: Min lon, min lat, max lon, max lat (i32, x 10^7)
//! Byte    118:   Center zoom
//! Bytes 119-126: Center lon, center lat (i32, x 10^7)
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::ArchiveError;
use crate::io::{read_i32_le, read_u64_le};

// =============================================================================
// Constants
// =============================================================================

/// Magic bytes at the start of every archive
pub const MAGIC: &[u8; 7] = b"PMTiles";

/// The only spec version this server understands
pub const SPEC_VERSION: u8 = 3;

/// Size of the fixed header in bytes
pub const HEADER_SIZE: usize = 127;

/// Scale factor of the fixed-point coordinates in the header
const COORDINATE_SCALE: f64 = 10_000_000.0;

// =============================================================================
// Compression
// =============================================================================

/// Compression applied to directories, metadata, or tile payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    Unknown,
    None,
    Gzip,
    Brotli,
    Zstd,
}

impl Compression {
    /// Decode a header tag, rejecting unassigned values.
    pub fn from_tag(tag: u8) -> Result<Self, ArchiveError> {
        match tag {
            0 => Ok(Compression::Unknown),
            1 => Ok(Compression::None),
            2 => Ok(Compression::Gzip),
            3 => Ok(Compression::Brotli),
            4 => Ok(Compression::Zstd),
            other => Err(ArchiveError::UnknownCompression(other)),
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Compression::Unknown => "unknown",
            Compression::None => "none",
            Compression::Gzip => "gzip",
            Compression::Brotli => "brotli",
            Compression::Zstd => "zstd",
        };
        f.write_str(name)
    }
}

// =============================================================================
// TileType
// =============================================================================

/// Format of the tile payloads. Opaque to the server except for content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileType {
    Unknown,
    Mvt,
    Png,
    Jpeg,
    Webp,
    Avif,
}

impl TileType {
    /// Decode a header tag, rejecting unassigned values.
    pub fn from_tag(tag: u8) -> Result<Self, ArchiveError> {
        match tag {
            0 => Ok(TileType::Unknown),
            1 => Ok(TileType::Mvt),
            2 => Ok(TileType::Png),
            3 => Ok(TileType::Jpeg),
            4 => Ok(TileType::Webp),
            5 => Ok(TileType::Avif),
            other => Err(ArchiveError::UnknownTileType(other)),
        }
    }

    /// MIME type for HTTP responses.
    pub fn content_type(self) -> &'static str {
        match self {
            TileType::Mvt => "application/x-protobuf",
            TileType::Png => "image/png",
            TileType::Jpeg => "image/jpeg",
            TileType::Webp => "image/webp",
            TileType::Avif => "image/avif",
            TileType::Unknown => "application/octet-stream",
        }
    }
}

// =============================================================================
// ArchiveHeader
// =============================================================================

/// Parsed archive header.
///
/// Offsets are absolute positions in the archive object. Counts are zero when
/// the archive producer did not record them.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveHeader {
    pub spec_version: u8,
    pub root_directory_offset: u64,
    pub root_directory_length: u64,
    pub metadata_offset: u64,
    pub metadata_length: u64,
    pub leaf_directory_offset: u64,
    pub leaf_directory_length: u64,
    pub tile_data_offset: u64,
    pub tile_data_length: u64,
    pub num_addressed_tiles: u64,
    pub num_tile_entries: u64,
    pub num_tile_contents: u64,
    pub clustered: bool,
    pub internal_compression: Compression,
    pub tile_compression: Compression,
    pub tile_type: TileType,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub center_zoom: u8,
    pub center_lon: f64,
    pub center_lat: f64,
}

impl ArchiveHeader {
    /// Parse a header from the first [`HEADER_SIZE`] bytes of an archive.
    ///
    /// Extra trailing bytes are ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, ArchiveError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ArchiveError::TooSmall {
                required: HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        if &bytes[0..7] != MAGIC {
            return Err(ArchiveError::InvalidMagic);
        }

        let spec_version = bytes[7];
        if spec_version != SPEC_VERSION {
            return Err(ArchiveError::UnsupportedVersion(spec_version));
        }

        let min_zoom = bytes[100];
        let max_zoom = bytes[101];
        if min_zoom > max_zoom {
            return Err(ArchiveError::InvalidZoomBounds { min_zoom, max_zoom });
        }

        let coordinate = |at: usize| f64::from(read_i32_le(&bytes[at..])) / COORDINATE_SCALE;

        Ok(Self {
            spec_version,
            root_directory_offset: read_u64_le(&bytes[8..]),
            root_directory_length: read_u64_le(&bytes[16..]),
            metadata_offset: read_u64_le(&bytes[24..]),
            metadata_length: read_u64_le(&bytes[32..]),
            leaf_directory_offset: read_u64_le(&bytes[40..]),
            leaf_directory_length: read_u64_le(&bytes[48..]),
            tile_data_offset: read_u64_le(&bytes[56..]),
            tile_data_length: read_u64_le(&bytes[64..]),
            num_addressed_tiles: read_u64_le(&bytes[72..]),
            num_tile_entries: read_u64_le(&bytes[80..]),
            num_tile_contents: read_u64_le(&bytes[88..]),
            clustered: bytes[96] == 1,
            internal_compression: Compression::from_tag(bytes[97])?,
            tile_compression: Compression::from_tag(bytes[98])?,
            tile_type: TileType::from_tag(bytes[99])?,
            min_zoom,
            max_zoom,
            min_lon: coordinate(102),
            min_lat: coordinate(106),
            max_lon: coordinate(110),
            max_lat: coordinate(114),
            center_zoom: bytes[118],
            center_lon: coordinate(119),
            center_lat: coordinate(123),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
