//! `Range` request header parsing for the raw archive endpoint.
//!
//! Only a single `bytes=<start>-<end?>` range is accepted. Suffix ranges
//! (`bytes=-500`) and multi-range requests are rejected as malformed.

use crate::error::RangeError;
use crate::io::ByteRange;

/// Parse a `Range` header value against an object of `total` bytes.
///
/// An omitted end means "to the last byte". The result must satisfy
/// `start <= end < total`.
pub fn parse_range(value: &str, total: u64) -> Result<ByteRange, RangeError> {
    let value = value.trim();
    let bounds = value
        .strip_prefix("bytes=")
        .ok_or_else(|| RangeError::Malformed(format!("expected bytes unit in {value:?}")))?;

    if bounds.contains(',') {
        return Err(RangeError::Malformed(
            "multiple ranges are not supported".to_string(),
        ));
    }

    let (start, end) = bounds
        .split_once('-')
        .ok_or_else(|| RangeError::Malformed(format!("missing '-' in {value:?}")))?;

    let start = start.trim();
    let end = end.trim();
    if start.is_empty() {
        return Err(RangeError::Malformed(
            "suffix ranges are not supported".to_string(),
        ));
    }

    let start = parse_position(start)?;
    let end = if end.is_empty() {
        match total.checked_sub(1) {
            Some(last) => last,
            None => {
                return Err(RangeError::Unsatisfiable {
                    start,
                    end: start,
                    total,
                })
            }
        }
    } else {
        parse_position(end)?
    };

    if start > end || end >= total {
        return Err(RangeError::Unsatisfiable { start, end, total });
    }

    Ok(ByteRange::from_inclusive(start, end))
}

fn parse_position(s: &str) -> Result<u64, RangeError> {
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeError::Malformed(format!("invalid position {s:?}")));
    }
    s.parse()
        .map_err(|_| RangeError::Malformed(format!("position {s:?} is too large")))
}

/// `Content-Range` value for a satisfied range.
pub fn content_range(range: ByteRange, total: u64) -> String {
    format!("bytes {}-{}/{}", range.offset, range.last(), total)
}
