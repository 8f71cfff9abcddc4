//! Recovery of the parameters that produced a deflate stream.
//!
//! Zip archives do not record how an entry was compressed, only that it was.
//! The parameters are recovered by recompressing the uncompressed content at
//! each supported level until the original stream is reproduced exactly.

use tracing::trace;
use zipdelta_common::{crc, ByteSource, Error, Result};
use zipdelta_zip::{CompressionMethod, DeflateHint, ZipEntry};

use crate::codec::{compress_raw, uncompress_raw, DeflateParameters};

fn preferred_levels(hint: Option<DeflateHint>) -> &'static [u32] {
    match hint {
        Some(DeflateHint::Normal) => &[6],
        Some(DeflateHint::Maximum) => &[9, 8],
        Some(DeflateHint::Fast) => &[2, 3],
        Some(DeflateHint::SuperFast) => &[1],
        None => &[],
    }
}

/// Every supported parameter set, the ones suggested by `hint` first.
pub fn candidate_parameters(hint: Option<DeflateHint>) -> Vec<DeflateParameters> {
    let preferred = preferred_levels(hint);
    let mut candidates: Vec<DeflateParameters> = preferred
        .iter()
        .filter_map(|&level| DeflateParameters::new(level).ok())
        .collect();
    candidates.extend(DeflateParameters::all().filter(|p| !preferred.contains(&p.level())));
    candidates
}

/// Find parameters that turn `uncompressed` into exactly `compressed`.
pub fn divine_parameters(
    compressed: &[u8],
    uncompressed: &[u8],
    hint: Option<DeflateHint>,
) -> Result<Option<DeflateParameters>> {
    for params in candidate_parameters(hint) {
        if compress_raw(uncompressed, params)? == compressed {
            return Ok(Some(params));
        }
    }
    Ok(None)
}

/// Find the parameters that reproduce a deflate entry's payload.
///
/// Returns `None` when no supported parameter set reproduces it. Fails with
/// [`Error::UnsupportedCodec`] for entries that are not deflate compressed.
pub fn divine_entry<S: ByteSource + ?Sized>(entry: &ZipEntry, source: &S) -> Result<Option<DeflateParameters>> {
    match entry.compression_method() {
        CompressionMethod::Deflate => {}
        other => return Err(Error::UnsupportedCodec(other.as_u16())),
    }

    let compressed = entry.read_compressed(source)?;
    let uncompressed = uncompress_raw(&compressed, entry.uncompressed_size())?;
    if crc::crc32(&uncompressed) != entry.crc32() {
        return Err(Error::Corruption(format!(
            "CRC-32 mismatch for {}",
            entry.path_lossy()
        )));
    }

    let found = divine_parameters(&compressed, &uncompressed, entry.deflate_hint())?;
    trace!(
        path = %entry.path_lossy(),
        level = found.map(DeflateParameters::level),
        "divined deflate parameters"
    );
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipdelta_test_utils::{deflate_raw, ArchiveBuilder, TestEntry};
    use zipdelta_zip::list_entries;

    fn levels(hint: Option<DeflateHint>) -> Vec<u32> {
        candidate_parameters(hint).into_iter().map(DeflateParameters::level).collect()
    }

    #[test]
    fn test_candidate_order() {
        assert_eq!(levels(None), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(levels(Some(DeflateHint::Normal)), vec![6, 1, 2, 3, 4, 5, 7, 8, 9]);
        assert_eq!(levels(Some(DeflateHint::Maximum)), vec![9, 8, 1, 2, 3, 4, 5, 6, 7]);
        assert_eq!(levels(Some(DeflateHint::Fast)), vec![2, 3, 1, 4, 5, 6, 7, 8, 9]);
        assert_eq!(levels(Some(DeflateHint::SuperFast)), vec![1, 2, 3, 4, 5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_divine_every_level() {
        let data = crate::compatibility::corpus();
        for level in 1..=9 {
            let compressed = deflate_raw(&data, level);
            let found = divine_parameters(&compressed, &data, None).unwrap().unwrap();
            // Levels 8 and 9 produce identical output for this input.
            assert_eq!(compress_raw(&data, found).unwrap(), compressed);
        }
    }

    #[test]
    fn test_divine_foreign_stream() {
        let data = b"not produced by any level".repeat(20);
        // A single stored block is valid deflate that no level produces for this input.
        let mut compressed = vec![0x01];
        compressed.extend_from_slice(&(data.len() as u16).to_le_bytes());
        compressed.extend_from_slice(&(!(data.len() as u16)).to_le_bytes());
        compressed.extend_from_slice(&data);

        assert_eq!(uncompress_raw(&compressed, data.len() as u64).unwrap(), data);
        assert_eq!(divine_parameters(&compressed, &data, None).unwrap(), None);
    }

    #[test]
    fn test_divine_entry() {
        let data = b"divination through the archive".repeat(30);
        let archive = ArchiveBuilder::new()
            .entry(TestEntry::deflated("max", &data, 9))
            .entry(TestEntry::deflated("fast", &data, 2))
            .entry(TestEntry::stored("plain", &data))
            .build();
        let entries = list_entries(archive.bytes.as_slice()).unwrap();
        let source = archive.bytes.as_slice();

        let max = divine_entry(&entries[0], source).unwrap().unwrap();
        assert_eq!(compress_raw(&data, max).unwrap(), archive.payload(b"max").unwrap());

        let fast = divine_entry(&entries[1], source).unwrap().unwrap();
        assert_eq!(compress_raw(&data, fast).unwrap(), archive.payload(b"fast").unwrap());

        assert!(matches!(
            divine_entry(&entries[2], source),
            Err(Error::UnsupportedCodec(0))
        ));
    }
}
