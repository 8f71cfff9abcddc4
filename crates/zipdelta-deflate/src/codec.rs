//! Raw deflate compression and decompression.

use std::io::Read;

use flate2::read::DeflateDecoder;
use flate2::{Compress, Compression, FlushCompress, Status};
use zipdelta_common::{crc, ByteSource, Error, LimitedReader, Result};
use zipdelta_zip::{CompressionMethod, ZipEntry};

/// Parameters that reproduce a raw deflate stream.
///
/// Only the level varies; window size, memory level and strategy are always
/// the zlib defaults, which is what virtually every zip writer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeflateParameters {
    level: u8,
}

impl DeflateParameters {
    /// Lowest supported level.
    pub const MIN_LEVEL: u32 = 1;
    /// Highest supported level.
    pub const MAX_LEVEL: u32 = 9;

    /// Parameters for `level`, which must be in `1..=9`.
    pub fn new(level: u32) -> Result<Self> {
        if !(Self::MIN_LEVEL..=Self::MAX_LEVEL).contains(&level) {
            return Err(Error::InvalidArgument(format!(
                "deflate level must be between {} and {}: {level}",
                Self::MIN_LEVEL,
                Self::MAX_LEVEL
            )));
        }
        Ok(Self { level: level as u8 })
    }

    /// The compression level.
    #[inline]
    pub const fn level(self) -> u32 {
        self.level as u32
    }

    /// Every supported parameter set, from level 1 to 9.
    pub fn all() -> impl Iterator<Item = Self> {
        (Self::MIN_LEVEL..=Self::MAX_LEVEL).map(|level| Self { level: level as u8 })
    }
}

/// Compress `data` into a raw deflate stream (no zlib header or trailer).
///
/// The whole input is handed to the compressor in one call with a finishing
/// flush, so the output only depends on the data and the parameters.
pub fn compress_raw(data: &[u8], params: DeflateParameters) -> Result<Vec<u8>> {
    let mut compress = Compress::new(Compression::new(params.level()), false);

    let n = data.len();
    let mut out = Vec::with_capacity(n + ((n + 7) >> 3) + ((n + 63) >> 6) + 5);
    loop {
        let consumed = usize::try_from(compress.total_in())
            .map_err(|_| Error::Corruption("deflate consumed more than its input".into()))?;
        let status = compress
            .compress_vec(&data[consumed..], &mut out, FlushCompress::Finish)
            .map_err(|e| Error::Corruption(format!("deflate failed: {e}")))?;
        match status {
            Status::StreamEnd => return Ok(out),
            _ => out.reserve(out.capacity().max(64)),
        }
    }
}

/// Decompress a raw deflate stream that must expand to exactly `expected_size` bytes.
pub fn uncompress_raw(data: &[u8], expected_size: u64) -> Result<Vec<u8>> {
    let limit = i64::try_from(expected_size.saturating_add(1))
        .map_err(|_| Error::InvalidArgument(format!("uncompressed size {expected_size} is too large")))?;
    // One byte of slack so an oversized stream is detected instead of cut.
    let mut reader = LimitedReader::new(DeflateDecoder::new(data), limit)?;

    let mut output = Vec::with_capacity(usize::try_from(expected_size).unwrap_or(0));
    reader
        .read_to_end(&mut output)
        .map_err(|e| Error::Corruption(format!("inflate failed: {e}")))?;

    if output.len() as u64 != expected_size {
        return Err(Error::Corruption(format!(
            "inflated to {} bytes, expected {expected_size}",
            output.len()
        )));
    }
    Ok(output)
}

/// Read and decompress an entry's payload, verifying its CRC-32.
///
/// Fails with [`Error::UnsupportedCodec`] for methods other than stored and deflate.
pub fn uncompress_entry<S: ByteSource + ?Sized>(entry: &ZipEntry, source: &S) -> Result<Vec<u8>> {
    let data = match entry.compression_method() {
        CompressionMethod::Stored => entry.read_compressed(source)?,
        CompressionMethod::Deflate => {
            uncompress_raw(&entry.read_compressed(source)?, entry.uncompressed_size())?
        }
        CompressionMethod::Other(id) => return Err(Error::UnsupportedCodec(id)),
    };

    let actual = crc::crc32(&data);
    if actual != entry.crc32() {
        return Err(Error::Corruption(format!(
            "CRC-32 mismatch for {}: expected {:#010x}, got {actual:#010x}",
            entry.path_lossy(),
            entry.crc32()
        )));
    }
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use zipdelta_test_utils::{deflate_raw, ArchiveBuilder, TestEntry};
    use zipdelta_zip::list_entries;

    fn sample() -> Vec<u8> {
        b"a moderately repetitive sentence for the codec tests. ".repeat(50)
    }

    #[test]
    fn test_parameters_range() {
        assert!(DeflateParameters::new(0).is_err());
        assert!(DeflateParameters::new(10).is_err());
        assert_eq!(DeflateParameters::new(9).unwrap().level(), 9);
        let levels: Vec<u32> = DeflateParameters::all().map(|p| p.level()).collect();
        assert_eq!(levels, (1..=9).collect::<Vec<_>>());
    }

    #[test]
    fn test_compress_matches_single_shot_deflate() {
        let data = sample();
        for params in DeflateParameters::all() {
            assert_eq!(compress_raw(&data, params).unwrap(), deflate_raw(&data, params.level()));
        }
    }

    #[test]
    fn test_compress_empty() {
        let params = DeflateParameters::new(6).unwrap();
        let compressed = compress_raw(&[], params).unwrap();
        assert!(!compressed.is_empty());
        assert!(uncompress_raw(&compressed, 0).unwrap().is_empty());
    }

    #[test]
    fn test_uncompress_raw_checks_size() {
        let data = sample();
        let compressed = compress_raw(&data, DeflateParameters::new(6).unwrap()).unwrap();

        assert_eq!(uncompress_raw(&compressed, data.len() as u64).unwrap(), data);
        assert!(matches!(
            uncompress_raw(&compressed, data.len() as u64 - 1),
            Err(Error::Corruption(_))
        ));
        assert!(matches!(
            uncompress_raw(&compressed, data.len() as u64 + 1),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_uncompress_garbage() {
        assert!(matches!(
            uncompress_raw(&[0xFF; 32], 100),
            Err(Error::Corruption(_))
        ));
    }

    #[test]
    fn test_uncompress_entry() {
        let data = sample();
        let archive = ArchiveBuilder::new()
            .entry(TestEntry::stored("stored", b"plain"))
            .entry(TestEntry::deflated("deflated", &data, 6))
            .entry(TestEntry::with_payload("bzip", 12, vec![1, 2, 3], 0, 3))
            .build();
        let entries = list_entries(archive.bytes.as_slice()).unwrap();

        assert_eq!(uncompress_entry(&entries[0], archive.bytes.as_slice()).unwrap(), b"plain");
        assert_eq!(uncompress_entry(&entries[1], archive.bytes.as_slice()).unwrap(), data);
        assert!(matches!(
            uncompress_entry(&entries[2], archive.bytes.as_slice()),
            Err(Error::UnsupportedCodec(12))
        ));
    }

    #[test]
    fn test_uncompress_entry_crc_mismatch() {
        let archive = ArchiveBuilder::new()
            .entry(TestEntry::with_payload("bad-crc", 0, b"data".to_vec(), 0xDEAD_BEEF, 4))
            .build();
        let entries = list_entries(archive.bytes.as_slice()).unwrap();

        assert!(matches!(
            uncompress_entry(&entries[0], archive.bytes.as_slice()),
            Err(Error::Corruption(_))
        ));
    }
}
