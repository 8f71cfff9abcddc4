//! Zip archive entry.

use std::borrow::Cow;
use std::io::Read;
use std::ops::Range;

use zipdelta_common::{window, ByteSource, Error, Result};

use crate::zip::{flags, CompressionMethod, DeflateHint};

/// An entry (file) within a zip archive.
///
/// This contains the structural metadata needed to locate the entry's
/// payload, not the payload itself. Everything is fixed when the central
/// directory is parsed except the compressed data offset, which is only known
/// after the variable-length local header has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Path as raw bytes; not assumed to be valid UTF-8.
    path: Vec<u8>,
    /// Compression method used.
    compression_method: CompressionMethod,
    /// General purpose bit flag.
    flags: u16,
    /// CRC32 checksum of uncompressed data.
    crc32: u32,
    /// Compressed size in bytes.
    compressed_size: u64,
    /// Uncompressed size in bytes.
    uncompressed_size: u64,
    /// Offset to the local file header in the archive.
    local_header_offset: u64,
    /// Offset to the compressed data, once resolved.
    data_offset: Option<u64>,
}

impl ZipEntry {
    /// Create a new entry whose data offset is not yet resolved.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        path: Vec<u8>,
        compression_method: CompressionMethod,
        flags: u16,
        crc32: u32,
        compressed_size: u64,
        uncompressed_size: u64,
        local_header_offset: u64,
    ) -> Self {
        Self {
            path,
            compression_method,
            flags,
            crc32,
            compressed_size,
            uncompressed_size,
            local_header_offset,
            data_offset: None,
        }
    }

    /// Return a copy with the compressed data offset set.
    pub fn with_data_offset(mut self, data_offset: u64) -> Self {
        self.data_offset = Some(data_offset);
        self
    }

    pub(crate) fn set_data_offset(&mut self, data_offset: u64) {
        self.data_offset = Some(data_offset);
    }

    /// Get the raw path bytes.
    #[inline]
    pub fn path(&self) -> &[u8] {
        &self.path
    }

    /// Get the path for display, replacing invalid UTF-8.
    pub fn path_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.path)
    }

    /// Get the compression method.
    #[inline]
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression_method
    }

    /// Get the general purpose bit flag.
    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Check if the payload is followed by a data descriptor.
    #[inline]
    pub fn has_data_descriptor(&self) -> bool {
        self.flags & flags::DATA_DESCRIPTOR != 0
    }

    /// Check if the entry is encrypted.
    #[inline]
    pub fn is_encrypted(&self) -> bool {
        self.flags & flags::ENCRYPTED != 0
    }

    /// Get the deflate level hint, for deflate entries only.
    pub fn deflate_hint(&self) -> Option<DeflateHint> {
        (self.compression_method == CompressionMethod::Deflate)
            .then(|| DeflateHint::from_flags(self.flags))
    }

    /// Get the CRC32 checksum.
    #[inline]
    pub fn crc32(&self) -> u32 {
        self.crc32
    }

    /// Get the compressed size in bytes.
    #[inline]
    pub fn compressed_size(&self) -> u64 {
        self.compressed_size
    }

    /// Get the uncompressed size in bytes.
    #[inline]
    pub fn uncompressed_size(&self) -> u64 {
        self.uncompressed_size
    }

    /// Get the offset to the local file header.
    #[inline]
    pub fn local_header_offset(&self) -> u64 {
        self.local_header_offset
    }

    /// Get the offset to the compressed data.
    ///
    /// Fails if the local header has not been parsed yet.
    pub fn data_offset(&self) -> Result<u64> {
        self.data_offset.ok_or_else(|| {
            Error::Format(format!(
                "compressed data offset of {} is not resolved",
                self.path_lossy()
            ))
        })
    }

    /// Byte range of the compressed data in the archive.
    pub fn data_range(&self) -> Result<Range<u64>> {
        let start = self.data_offset()?;
        let end = start.checked_add(self.compressed_size).ok_or_else(|| {
            Error::Format(format!("entry {} extends past u64 range", self.path_lossy()))
        })?;
        Ok(start..end)
    }

    /// Read the compressed payload from `source`, never past its declared end.
    pub fn read_compressed<S: ByteSource + ?Sized>(&self, source: &S) -> Result<Vec<u8>> {
        let range = self.data_range()?;
        let mut reader = window(source, range.start, self.compressed_size)?;

        let mut data = Vec::with_capacity(usize::try_from(self.compressed_size).unwrap_or(0));
        reader.read_to_end(&mut data)?;
        if (data.len() as u64) != self.compressed_size {
            return Err(Error::Format(format!(
                "entry {} is truncated: expected {} bytes, found {}",
                self.path_lossy(),
                self.compressed_size,
                data.len()
            )));
        }
        Ok(data)
    }
}
