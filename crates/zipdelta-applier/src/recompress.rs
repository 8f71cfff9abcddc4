//! Recompression of uncompressed entries in a new delta-friendly blob.

use std::ops::Range;

use tracing::trace;
use zipdelta_common::{crc, Error, Result};
use zipdelta_deflate::{compress_raw, DeflateParameters};
use zipdelta_patch::PlanRecord;

/// Deflate method id.
const DEFLATE: u16 = 8;

/// A range of the delta-friendly blob and the compressed bytes replacing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecompressedRange {
    pub range: Range<u64>,
    pub compressed: Vec<u8>,
}

/// Recompress every new entry the plan uncompressed.
///
/// Each range is checked against its CRC-32 before recompression, and the
/// recompressed stream must have exactly the recorded compressed size.
/// The result is sorted by position and free of overlaps.
pub fn recompress_ranges(blob: &[u8], records: &[PlanRecord]) -> Result<Vec<RecompressedRange>> {
    let jobs: Vec<(&PlanRecord, u64)> = records
        .iter()
        .filter_map(|record| record.new_delta_friendly_offset.map(|offset| (record, offset)))
        .collect();

    #[cfg(feature = "parallel")]
    let mut recompressed: Vec<RecompressedRange> = {
        use rayon::prelude::*;
        jobs.par_iter()
            .map(|&(record, offset)| recompress_one(blob, record, offset))
            .collect::<Result<_>>()?
    };
    #[cfg(not(feature = "parallel"))]
    let mut recompressed: Vec<RecompressedRange> = jobs
        .iter()
        .map(|&(record, offset)| recompress_one(blob, record, offset))
        .collect::<Result<_>>()?;

    recompressed.sort_by_key(|r| r.range.start);
    for pair in recompressed.windows(2) {
        if pair[1].range.start < pair[0].range.end {
            return Err(Error::Corruption(format!(
                "recompression ranges {:?} and {:?} overlap",
                pair[0].range, pair[1].range
            )));
        }
    }
    Ok(recompressed)
}

fn recompress_one(blob: &[u8], record: &PlanRecord, offset: u64) -> Result<RecompressedRange> {
    let path = String::from_utf8_lossy(&record.path);
    if record.new.method != DEFLATE {
        return Err(Error::Format(format!(
            "{path}: cannot recompress with method {}",
            record.new.method
        )));
    }
    let level = record
        .new
        .deflate_level
        .ok_or_else(|| Error::Format(format!("{path}: recompression level is missing")))?;
    let params = DeflateParameters::new(u32::from(level))?;

    let range = offset
        .checked_add(record.new.uncompressed_size)
        .filter(|&end| end <= blob.len() as u64)
        .map(|end| offset..end)
        .ok_or_else(|| {
            Error::Corruption(format!(
                "{path}: {} bytes at {offset} exceed the {} byte delta-friendly blob",
                record.new.uncompressed_size,
                blob.len()
            ))
        })?;
    let uncompressed = &blob[range.start as usize..range.end as usize];

    let actual = crc::crc32(uncompressed);
    if actual != record.new.crc32 {
        return Err(Error::Corruption(format!(
            "{path}: CRC-32 mismatch before recompression: expected {:#010x}, got {actual:#010x}",
            record.new.crc32
        )));
    }

    let compressed = compress_raw(uncompressed, params)?;
    if compressed.len() as u64 != record.new.compressed_size {
        return Err(Error::Corruption(format!(
            "{path}: recompressed to {} bytes, expected {}",
            compressed.len(),
            record.new.compressed_size
        )));
    }

    trace!(path = %path, level, size = compressed.len(), "recompressed entry");
    Ok(RecompressedRange { range, compressed })
}
