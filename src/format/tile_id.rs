//! Tile coordinate <-> tile id codec.
//!
//! Tile ids order every tile of every zoom level along a Hilbert curve:
//! all tiles of zoom `z` come after all tiles of zoom `z - 1`, and within a
//! zoom level tiles follow the curve. Directory entries are sorted by this id,
//! so the encoding here must match the one used to build the archive exactly.
//!
//! ```text
//! tile_id(z, x, y) = (4^z - 1) / 3 + hilbert_z(x, y)
//! ```

use std::fmt;

use crate::error::TileError;

/// Largest zoom whose ids fit in a `u64`.
pub const MAX_ZOOM: u8 = 31;

/// Number of tiles in all zoom levels below `zoom`, i.e. the first id of `zoom`.
#[inline]
fn zoom_base(zoom: u8) -> u64 {
    ((1u64 << (2 * u32::from(zoom))) - 1) / 3
}

/// First id past the last encodable zoom level.
const fn id_limit() -> u64 {
    // (4^32 - 1) / 3, and u64::MAX is exactly 4^32 - 1
    u64::MAX / 3
}

/// A validated `(zoom, x, y)` tile address.
///
/// `x` is the column counted from the west edge, `y` the row counted from the
/// north edge, both in `[0, 2^zoom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Create a coordinate, rejecting zooms above [`MAX_ZOOM`] and columns or
    /// rows outside the zoom level.
    pub fn new(zoom: u8, x: u64, y: u64) -> Result<Self, TileError> {
        if zoom > MAX_ZOOM {
            return Err(TileError::CoordinateOutOfRange { zoom, x, y });
        }
        let extent = 1u64 << zoom;
        if x >= extent || y >= extent {
            return Err(TileError::CoordinateOutOfRange { zoom, x, y });
        }
        Ok(Self {
            zoom,
            x: x as u32,
            y: y as u32,
        })
    }

    /// Encode this coordinate as a tile id.
    pub fn tile_id(&self) -> u64 {
        let n = 1u64 << self.zoom;
        let mut x = u64::from(self.x);
        let mut y = u64::from(self.y);
        let mut d = 0u64;

        let mut s = n >> 1;
        while s > 0 {
            let rx = u64::from((x & s) > 0);
            let ry = u64::from((y & s) > 0);
            d += s * s * ((3 * rx) ^ ry);
            rotate(n, &mut x, &mut y, rx, ry);
            s >>= 1;
        }

        zoom_base(self.zoom) + d
    }

    /// Decode a tile id back into a coordinate.
    pub fn from_tile_id(tile_id: u64) -> Result<Self, TileError> {
        if tile_id >= id_limit() {
            return Err(TileError::TileIdOutOfRange(tile_id));
        }

        let mut zoom = 0u8;
        while zoom < MAX_ZOOM && tile_id >= zoom_base(zoom + 1) {
            zoom += 1;
        }

        let n = 1u64 << zoom;
        let mut t = tile_id - zoom_base(zoom);
        let mut x = 0u64;
        let mut y = 0u64;

        let mut s = 1u64;
        while s < n {
            let rx = 1 & (t / 2);
            let ry = 1 & (t ^ rx);
            rotate(s, &mut x, &mut y, rx, ry);
            x += s * rx;
            y += s * ry;
            t /= 4;
            s *= 2;
        }

        Ok(Self {
            zoom,
            x: x as u32,
            y: y as u32,
        })
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// Rotate/flip a quadrant so the sub-curve has the right orientation.
#[inline]
fn rotate(n: u64, x: &mut u64, y: &mut u64, rx: u64, ry: u64) {
    if ry == 0 {
        if rx == 1 {
            *x = n - 1 - *x;
            *y = n - 1 - *y;
        }
        std::mem::swap(x, y);
    }
}
