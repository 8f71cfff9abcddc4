//! Patch application.

use tracing::debug;
use zipdelta_common::{ByteSource, Error, Result};
use zipdelta_deflate::{generate_delta_friendly_blob, CompressedRange, DeflateCapability};
use zipdelta_patch::{DeltaApplier, PatchContainer, PlanRecord};

use crate::recompress::recompress_ranges;

/// Applies patches to old archives.
#[derive(Debug, Clone, Copy)]
pub struct PatchApplier {
    capability: DeflateCapability,
}

impl Default for PatchApplier {
    fn default() -> Self {
        Self::new()
    }
}

impl PatchApplier {
    /// An applier using the detected deflate capability.
    pub fn new() -> Self {
        Self::with_capability(DeflateCapability::detect())
    }

    pub fn with_capability(capability: DeflateCapability) -> Self {
        Self { capability }
    }

    /// Apply serialized `patch` to `old` and return the new archive.
    pub fn apply<S, D>(&self, old: &S, patch: &[u8], differ: &D) -> Result<Vec<u8>>
    where
        S: ByteSource + ?Sized,
        D: DeltaApplier + ?Sized,
    {
        let container = PatchContainer::from_bytes(patch)?;
        self.apply_container(old, &container, differ)
    }

    /// Apply a parsed patch to `old` and return the new archive.
    ///
    /// Fails with [`Error::Corruption`] whenever an intermediate or final size
    /// disagrees with the patch, or recompression is not bit-exact.
    pub fn apply_container<S, D>(&self, old: &S, patch: &PatchContainer, differ: &D) -> Result<Vec<u8>>
    where
        S: ByteSource + ?Sized,
        D: DeltaApplier + ?Sized,
    {
        if old.len() != patch.old_archive_size {
            return Err(Error::Corruption(format!(
                "patch expects a {} byte old archive, got {} bytes",
                patch.old_archive_size,
                old.len()
            )));
        }

        let old_ranges = old_ranges(&patch.records);
        let old_blob = generate_delta_friendly_blob(old, &old_ranges).map_err(|e| match e {
            Error::InvalidArgument(msg) => Error::Format(msg),
            other => other,
        })?;
        check_size("old delta-friendly blob", old_blob.bytes.len(), patch.old_blob_size)?;

        let new_blob = differ.apply_delta(&old_blob.bytes, &patch.delta)?;
        check_size("new delta-friendly blob", new_blob.len(), patch.new_blob_size)?;

        if patch.records.iter().any(|r| r.option.uncompresses_new()) {
            self.capability.require()?;
        }
        let recompressed = recompress_ranges(&new_blob, &patch.records)?;

        let mut archive = Vec::with_capacity(usize::try_from(patch.new_archive_size).unwrap_or(0));
        let mut cursor = 0usize;
        for piece in &recompressed {
            archive.extend_from_slice(&new_blob[cursor..piece.range.start as usize]);
            archive.extend_from_slice(&piece.compressed);
            cursor = piece.range.end as usize;
        }
        archive.extend_from_slice(&new_blob[cursor..]);
        check_size("new archive", archive.len(), patch.new_archive_size)?;

        debug!(
            old_len = old.len(),
            new_len = archive.len(),
            recompressed = recompressed.len(),
            "applied patch"
        );
        Ok(archive)
    }
}

fn old_ranges(records: &[PlanRecord]) -> Vec<CompressedRange> {
    let mut ranges: Vec<CompressedRange> = records
        .iter()
        .filter(|record| record.option.uncompresses_old())
        .map(|record| CompressedRange {
            offset: record.old.data_offset,
            compressed_size: record.old.compressed_size,
            uncompressed_size: record.old.uncompressed_size,
            crc32: record.old.crc32,
        })
        .collect();
    ranges.sort_by_key(|range| range.offset);
    ranges.dedup_by_key(|range| range.offset);
    ranges
}

fn check_size(what: &str, actual: usize, expected: u64) -> Result<()> {
    if actual as u64 != expected {
        return Err(Error::Corruption(format!(
            "{what} is {actual} bytes, expected {expected}"
        )));
    }
    Ok(())
}
