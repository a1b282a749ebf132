//! Decompression of directories, metadata and tile payloads.

use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;

use super::header::Compression;
use crate::error::ArchiveError;

/// Maximum allowed decompressed size (256 MiB).
///
/// Directories and tiles are tiny in practice; anything beyond this is treated
/// as a compression bomb.
pub const MAX_DECOMPRESSED_SIZE: u64 = 256 * 1024 * 1024;

/// Decompress `data` with the declared algorithm.
///
/// `None` and `Unknown` (tag 0, producer did not declare a codec) return the
/// input untouched. `Brotli` cannot be decoded by this server and fails as a
/// corrupt archive.
pub fn decompress(data: Bytes, compression: Compression) -> Result<Bytes, ArchiveError> {
    match compression {
        Compression::None | Compression::Unknown => Ok(data),
        Compression::Gzip => read_bounded(GzDecoder::new(data.as_ref()), "gzip"),
        Compression::Zstd => {
            let decoder = zstd::stream::read::Decoder::new(data.as_ref())
                .map_err(|e| ArchiveError::Decompression(format!("zstd: {e}")))?;
            read_bounded(decoder, "zstd")
        }
        Compression::Brotli => Err(ArchiveError::UnsupportedCompression(compression)),
    }
}

/// Drain a decoder, failing if it produces more than [`MAX_DECOMPRESSED_SIZE`].
fn read_bounded<R: Read>(decoder: R, codec: &str) -> Result<Bytes, ArchiveError> {
    let mut out = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_SIZE + 1)
        .read_to_end(&mut out)
        .map_err(|e| ArchiveError::Decompression(format!("{codec}: {e}")))?;

    if out.len() as u64 > MAX_DECOMPRESSED_SIZE {
        return Err(ArchiveError::Decompression(format!(
            "{codec}: output exceeds {MAX_DECOMPRESSED_SIZE} bytes"
        )));
    }

    Ok(Bytes::from(out))
}
