//! Directory decoding and tile lookup.
//!
//! A directory is a sorted list of entries mapping tile ids to byte ranges.
//! After decompression it is stored column-wise as LEB128 varints:
//!
//! ```text
//! count
//! tile_id deltas  x count   (cumulative)
//! run lengths     x count   (0 = pointer to a leaf directory)
//! lengths         x count
//! offsets         x count   (0 = previous offset + previous length, else value + 1)
//! ```

use crate::error::ArchiveError;

// =============================================================================
// DirectoryEntry
// =============================================================================

/// One row of a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// First tile id answered by this entry
    pub tile_id: u64,

    /// Offset relative to the tile data section, or to the leaf directory
    /// section for leaf pointers
    pub offset: u64,

    /// Length of the addressed bytes
    pub length: u32,

    /// Number of consecutive tile ids sharing this payload; 0 marks a leaf pointer
    pub run_length: u32,
}

impl DirectoryEntry {
    /// Create a new entry.
    pub fn new(tile_id: u64, offset: u64, length: u32, run_length: u32) -> Self {
        Self {
            tile_id,
            offset,
            length,
            run_length,
        }
    }

    /// Whether this entry points at a leaf directory instead of tile data.
    #[inline]
    pub fn is_leaf_pointer(&self) -> bool {
        self.run_length == 0
    }

    /// Whether this entry answers `tile_id`, ignoring the entries after it.
    ///
    /// Leaf pointers extend to the next entry, so they cover every id from
    /// their own onwards at this level.
    #[inline]
    fn reaches(&self, tile_id: u64) -> bool {
        tile_id >= self.tile_id
            && (self.is_leaf_pointer() || tile_id - self.tile_id < u64::from(self.run_length))
    }

    /// First tile id the next entry is allowed to start at.
    fn next_start(&self) -> Option<u64> {
        self.tile_id.checked_add(u64::from(self.run_length.max(1)))
    }
}

// =============================================================================
// Directory
// =============================================================================

/// A validated directory: entries sorted by tile id with disjoint intervals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Directory {
    entries: Vec<DirectoryEntry>,
}

impl Directory {
    /// Build a directory, rejecting unsorted or overlapping entries.
    ///
    /// Disjointness guarantees that at most one entry can answer a tile id;
    /// an archive that violates it is corrupt.
    pub fn new(entries: Vec<DirectoryEntry>) -> Result<Self, ArchiveError> {
        for pair in entries.windows(2) {
            let previous_end = pair[0].next_start().ok_or_else(|| {
                ArchiveError::MalformedDirectory(format!(
                    "run of entry {} overflows the tile id space",
                    pair[0].tile_id
                ))
            })?;
            if pair[1].tile_id < previous_end {
                return Err(ArchiveError::InconsistentDirectory {
                    tile_id: pair[1].tile_id,
                    previous_end,
                });
            }
        }

        if let Some(last) = entries.last() {
            if last.next_start().is_none() {
                return Err(ArchiveError::MalformedDirectory(format!(
                    "run of entry {} overflows the tile id space",
                    last.tile_id
                )));
            }
        }

        Ok(Self { entries })
    }

    /// Decode a directory from its uncompressed varint encoding.
    pub fn decode(data: &[u8]) -> Result<Self, ArchiveError> {
        let mut cursor = VarintCursor::new(data);

        let count = cursor.read()?;
        // Each entry needs at least one byte per column
        if count > (cursor.remaining() / 4) as u64 {
            return Err(ArchiveError::MalformedDirectory(format!(
                "entry count {} exceeds directory size of {} bytes",
                count,
                data.len()
            )));
        }
        let count = count as usize;

        let mut entries = Vec::with_capacity(count);
        let mut tile_id = 0u64;
        for _ in 0..count {
            let delta = cursor.read()?;
            tile_id = tile_id.checked_add(delta).ok_or_else(|| {
                ArchiveError::MalformedDirectory("tile id overflows u64".to_string())
            })?;
            entries.push(DirectoryEntry::new(tile_id, 0, 0, 0));
        }

        for entry in entries.iter_mut() {
            entry.run_length = cursor.read_u32("run length")?;
        }

        for entry in entries.iter_mut() {
            entry.length = cursor.read_u32("length")?;
        }

        for i in 0..count {
            let value = cursor.read()?;
            entries[i].offset = if value == 0 {
                if i == 0 {
                    return Err(ArchiveError::MalformedDirectory(
                        "first entry cannot continue a previous offset".to_string(),
                    ));
                }
                let previous = entries[i - 1];
                previous
                    .offset
                    .checked_add(u64::from(previous.length))
                    .ok_or_else(|| {
                        ArchiveError::MalformedDirectory("offset overflows u64".to_string())
                    })?
            } else {
                value - 1
            };
        }

        Self::new(entries)
    }

    /// Find the entry answering `tile_id`.
    ///
    /// Returns a tile entry whose run covers the id, or the leaf pointer whose
    /// span (up to the next entry) contains it. `None` means the tile is absent.
    pub fn find(&self, tile_id: u64) -> Option<&DirectoryEntry> {
        // Index of the first entry starting after tile_id
        let idx = self.entries.partition_point(|e| e.tile_id <= tile_id);
        let candidate = self.entries.get(idx.checked_sub(1)?)?;
        candidate.reaches(tile_id).then_some(candidate)
    }

    /// All entries in tile id order.
    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the directory has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Varint decoding
// =============================================================================

/// LEB128 reader over a byte slice.
struct VarintCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> VarintCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read(&mut self) -> Result<u64, ArchiveError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = *self.data.get(self.pos).ok_or_else(|| {
                ArchiveError::MalformedDirectory("truncated varint".to_string())
            })?;
            self.pos += 1;

            if shift == 63 && byte > 1 {
                return Err(ArchiveError::MalformedDirectory(
                    "varint overflows u64".to_string(),
                ));
            }
            value |= u64::from(byte & 0x7F) << shift;

            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
            if shift > 63 {
                return Err(ArchiveError::MalformedDirectory(
                    "varint overflows u64".to_string(),
                ));
            }
        }
    }

    fn read_u32(&mut self, field: &str) -> Result<u32, ArchiveError> {
        let value = self.read()?;
        u32::try_from(value).map_err(|_| {
            ArchiveError::MalformedDirectory(format!("{field} {value} does not fit in 32 bits"))
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
