//! Delta-friendly blobs.
//!
//! A delta-friendly blob is a whole archive with selected deflate payloads
//! replaced, in place, by their uncompressed bytes. Everything else (headers,
//! the central directory, untouched payloads, data descriptors) is copied
//! through unchanged, so a binary differ sees aligned content wherever the
//! compression used to scramble it.

use std::ops::Range;

use tracing::debug;
use zipdelta_common::{crc, ByteSource, Error, Result};

use crate::codec::uncompress_raw;

/// A deflate payload in an archive that should be uncompressed in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressedRange {
    /// Offset of the compressed payload.
    pub offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// CRC-32 of the uncompressed payload.
    pub crc32: u32,
}

impl CompressedRange {
    fn end(&self) -> Result<u64> {
        self.offset
            .checked_add(self.compressed_size)
            .ok_or_else(|| Error::InvalidArgument(format!("range at {} overflows", self.offset)))
    }
}

/// A generated delta-friendly blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaFriendlyBlob {
    pub bytes: Vec<u8>,
    /// Where each input range's uncompressed bytes ended up, in input order.
    pub inverse_ranges: Vec<Range<u64>>,
}

/// Copy `source` while uncompressing every range in `ranges`.
///
/// Ranges must be sorted by offset and must not overlap. Each uncompressed
/// payload is checked against its CRC-32.
pub fn generate_delta_friendly_blob<S: ByteSource + ?Sized>(
    source: &S,
    ranges: &[CompressedRange],
) -> Result<DeltaFriendlyBlob> {
    let mut previous_end = 0u64;
    for range in ranges {
        if range.offset < previous_end {
            return Err(Error::InvalidArgument(format!(
                "range at {} overlaps or precedes the previous range ending at {previous_end}",
                range.offset
            )));
        }
        previous_end = range.end()?;
    }

    let expected_len = ranges.iter().try_fold(source.len(), |len, range| {
        len.checked_sub(range.compressed_size)
            .and_then(|len| len.checked_add(range.uncompressed_size))
            .ok_or_else(|| Error::InvalidArgument("delta-friendly blob size overflows".into()))
    })?;
    let capacity = usize::try_from(expected_len)
        .map_err(|_| Error::InvalidArgument(format!("delta-friendly blob of {expected_len} bytes")))?;

    let mut bytes = Vec::with_capacity(capacity);
    let mut inverse_ranges = Vec::with_capacity(ranges.len());
    let mut cursor = 0u64;

    for range in ranges {
        bytes.extend_from_slice(&source.read_range(cursor, range.offset - cursor)?);

        let compressed = source.read_range(range.offset, range.compressed_size)?;
        let uncompressed = uncompress_raw(&compressed, range.uncompressed_size)?;
        if crc::crc32(&uncompressed) != range.crc32 {
            return Err(Error::Corruption(format!(
                "CRC-32 mismatch for payload at offset {}",
                range.offset
            )));
        }

        let start = bytes.len() as u64;
        bytes.extend_from_slice(&uncompressed);
        inverse_ranges.push(start..bytes.len() as u64);
        cursor = range.offset + range.compressed_size;
    }

    bytes.extend_from_slice(&source.read_range(cursor, source.len() - cursor)?);
    debug!(
        source_len = source.len(),
        blob_len = bytes.len(),
        uncompressed_ranges = ranges.len(),
        "generated delta-friendly blob"
    );

    Ok(DeltaFriendlyBlob {
        bytes,
        inverse_ranges,
    })
}
