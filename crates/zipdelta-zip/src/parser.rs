//! Structural zip parsing.
//!
//! Only the records needed to locate each entry's payload are read: the end
//! of central directory, the central directory itself and every local header.
//! Payloads are never decompressed and fields irrelevant to patching are not
//! validated.
//!
//! Every record is read through a bounded stream, so a malformed length can
//! never make the parser read into a neighbouring entry.

use std::io::{self, Read};

use tracing::{debug, trace};
use zipdelta_common::{window, BinaryReader, ByteSource, Error, FromBytes, Result};

use crate::entry::ZipEntry;
use crate::zip::central_dir::extra_field;
use crate::zip::{CentralDirectoryHeader, Eocd64Locator, Eocd64Record, EocdRecord, LocalFileHeader};

/// Default number of trailing bytes searched for the EOCD signature.
pub const DEFAULT_EOCD_SEARCH_WINDOW: u64 = 32768;

/// Options controlling structural parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Number of trailing bytes scanned backwards for the EOCD signature.
    pub eocd_search_window: u64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            eocd_search_window: DEFAULT_EOCD_SEARCH_WINDOW,
        }
    }
}

impl ParseOptions {
    /// Set the EOCD search window.
    pub fn with_eocd_search_window(mut self, eocd_search_window: u64) -> Self {
        self.eocd_search_window = eocd_search_window;
        self
    }
}

/// Location and size of the central directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralDirectoryMetadata {
    /// Number of central directory records.
    pub entry_count: u64,
    /// Offset of the first central directory record.
    pub offset: u64,
    /// Length of the central directory in bytes.
    pub length: u64,
    /// The EOCD fields are saturated and must be taken from the ZIP64 records.
    pub needs_zip64: bool,
}

/// A parsed archive listing.
#[derive(Debug, Clone)]
pub(crate) struct Listing {
    pub(crate) central_directory: CentralDirectoryMetadata,
    pub(crate) entries: Vec<ZipEntry>,
}

/// Scan backwards from the end of `source` for the EOCD signature.
///
/// At most `max_search_window` trailing bytes are examined. Returns the
/// absolute offset of the signature, or `None` if it is not in the window.
pub fn locate_eocd<S: ByteSource + ?Sized>(source: &S, max_search_window: u64) -> Result<Option<u64>> {
    let search_len = source.len().min(max_search_window);
    let start = source.len() - search_len;
    let tail = source.read_range(start, search_len)?;

    let signature = EocdRecord::SIGNATURE.to_le_bytes();
    Ok(tail
        .windows(signature.len())
        .rposition(|candidate| candidate == signature)
        .map(|pos| start + pos as u64))
}

/// Read the EOCD record, signature included.
pub fn parse_eocd<R: Read>(reader: &mut R) -> Result<CentralDirectoryMetadata> {
    read_signature(reader, EocdRecord::SIGNATURE, "end of central directory")?;
    let record: EocdRecord = read_record(reader, "end of central directory")?;

    Ok(CentralDirectoryMetadata {
        entry_count: record.central_dir_count_total.get() as u64,
        offset: record.central_dir_offset.get() as u64,
        length: record.central_dir_size.get() as u64,
        needs_zip64: record.is_zip64(),
    })
}

/// Read one central directory record, signature included.
///
/// The returned entry does not know its compressed data offset yet.
pub fn parse_central_directory_entry<R: Read>(reader: &mut R) -> Result<ZipEntry> {
    read_signature(reader, CentralDirectoryHeader::SIGNATURE, "central directory record")?;
    let header: CentralDirectoryHeader = read_record(reader, "central directory record")?;

    let path = read_vec(reader, header.file_name_length.get() as usize, "entry path")?;
    let extra = read_vec(reader, header.extra_field_length.get() as usize, "extra field")?;
    skip(reader, header.file_comment_length.get() as u64, "file comment")?;

    let mut uncompressed_size = header.uncompressed_size.get() as u64;
    let mut compressed_size = header.compressed_size.get() as u64;
    let mut local_header_offset = header.local_header_offset.get() as u64;

    let saturated = |value: u64| value == u32::MAX as u64;
    if saturated(uncompressed_size) || saturated(compressed_size) || saturated(local_header_offset) {
        let data = find_extra_field(&extra, extra_field::ZIP64)?.ok_or_else(|| {
            Error::Format(format!(
                "entry {} has saturated fields but no ZIP64 extra field",
                String::from_utf8_lossy(&path)
            ))
        })?;

        // Only the saturated values are present, always in this order.
        let mut zip64 = BinaryReader::new(data);
        if saturated(uncompressed_size) {
            uncompressed_size = zip64.read_u64()?;
        }
        if saturated(compressed_size) {
            compressed_size = zip64.read_u64()?;
        }
        if saturated(local_header_offset) {
            local_header_offset = zip64.read_u64()?;
        }
    }

    Ok(ZipEntry::new(
        path,
        header.compression_method.get().into(),
        header.flags.get(),
        header.crc32.get(),
        compressed_size,
        uncompressed_size,
        local_header_offset,
    ))
}

/// Read one local header and return where its compressed data starts,
/// relative to the start of the header.
pub fn parse_local_header_and_get_data_offset<R: Read>(reader: &mut R) -> Result<u64> {
    read_signature(reader, LocalFileHeader::SIGNATURE, "local header")?;
    let header: LocalFileHeader = read_record(reader, "local header")?;

    let variable = header.variable_data_size() as u64;
    skip(reader, variable, "local header")?;

    Ok(LocalFileHeader::SIZE_WITH_SIGNATURE as u64 + variable)
}

/// List every entry of the archive in file order, using default options.
pub fn list_entries<S: ByteSource + ?Sized>(source: &S) -> Result<Vec<ZipEntry>> {
    list_entries_with_options(source, &ParseOptions::default())
}

/// List every entry of the archive in file order.
///
/// Entries are sorted by local header offset and each has its compressed
/// data offset resolved. Any malformed record aborts the whole listing.
pub fn list_entries_with_options<S: ByteSource + ?Sized>(
    source: &S,
    options: &ParseOptions,
) -> Result<Vec<ZipEntry>> {
    read_listing(source, options).map(|listing| listing.entries)
}

pub(crate) fn read_listing<S: ByteSource + ?Sized>(source: &S, options: &ParseOptions) -> Result<Listing> {
    let eocd_offset = locate_eocd(source, options.eocd_search_window)?.ok_or_else(|| {
        Error::Format(format!(
            "end of central directory not found in the last {} bytes",
            options.eocd_search_window
        ))
    })?;

    let mut central_directory =
        parse_eocd(&mut window(source, eocd_offset, source.len() - eocd_offset)?)?;
    if central_directory.needs_zip64 {
        central_directory = parse_zip64_eocd(source, eocd_offset)?;
    }

    let central_directory_end = central_directory
        .offset
        .checked_add(central_directory.length)
        .filter(|end| *end <= eocd_offset)
        .ok_or_else(|| Error::Format("central directory extends past its end record".into()))?;
    trace!(
        offset = central_directory.offset,
        end = central_directory_end,
        entries = central_directory.entry_count,
        "central directory located"
    );

    let count = usize::try_from(central_directory.entry_count)
        .map_err(|_| Error::Format("central directory entry count overflows".into()))?;
    // Every record is at least 46 bytes.
    let capacity = count.min((central_directory.length / 46) as usize);
    let mut entries = Vec::with_capacity(capacity);

    let mut reader = window(source, central_directory.offset, central_directory.length)?;
    for _ in 0..count {
        entries.push(parse_central_directory_entry(&mut reader)?);
    }

    entries.sort_by_key(ZipEntry::local_header_offset);

    for index in 0..entries.len() {
        let start = entries[index].local_header_offset();
        let end = entries
            .get(index + 1)
            .map_or(central_directory.offset, ZipEntry::local_header_offset);
        let len = end.checked_sub(start).ok_or_else(|| {
            Error::Format(format!(
                "local header of {} lies past the central directory",
                entries[index].path_lossy()
            ))
        })?;

        let relative = parse_local_header_and_get_data_offset(&mut window(source, start, len)?)?;
        entries[index].set_data_offset(start + relative);
    }

    debug!(
        entries = entries.len(),
        central_directory_offset = central_directory.offset,
        zip64 = central_directory.needs_zip64,
        "listed archive entries"
    );

    Ok(Listing {
        central_directory,
        entries,
    })
}

/// Resolve saturated EOCD fields through the ZIP64 locator and record.
fn parse_zip64_eocd<S: ByteSource + ?Sized>(source: &S, eocd_offset: u64) -> Result<CentralDirectoryMetadata> {
    let locator_offset = eocd_offset
        .checked_sub(Eocd64Locator::SIZE_WITH_SIGNATURE as u64)
        .ok_or_else(|| Error::Format("ZIP64 end of central directory locator missing".into()))?;

    let mut reader = window(source, locator_offset, Eocd64Locator::SIZE_WITH_SIGNATURE as u64)?;
    read_signature(&mut reader, Eocd64Locator::SIGNATURE, "ZIP64 locator")?;
    let locator: Eocd64Locator = read_record(&mut reader, "ZIP64 locator")?;

    let record_offset = locator.zip64_eocd_offset.get();
    let record_len = 4 + std::mem::size_of::<Eocd64Record>() as u64;
    let mut reader = window(source, record_offset, record_len)?;
    read_signature(&mut reader, Eocd64Record::SIGNATURE, "ZIP64 end of central directory")?;
    let record: Eocd64Record = read_record(&mut reader, "ZIP64 end of central directory")?;

    Ok(CentralDirectoryMetadata {
        entry_count: record.central_dir_count_total.get(),
        offset: record.central_dir_offset.get(),
        length: record.central_dir_size.get(),
        needs_zip64: true,
    })
}

fn find_extra_field(extra: &[u8], id: u16) -> Result<Option<&[u8]>> {
    let mut reader = BinaryReader::new(extra);
    while reader.remaining() >= 4 {
        let field_id = reader.read_u16()?;
        let size = reader.read_u16()? as usize;
        let data = reader.read_bytes(size)?;
        if field_id == id {
            return Ok(Some(data));
        }
    }
    Ok(None)
}

fn read_signature<R: Read>(reader: &mut R, expected: u32, what: &str) -> Result<()> {
    let mut bytes = [0u8; 4];
    reader.read_exact(&mut bytes).map_err(|e| Error::truncated(e, what))?;
    BinaryReader::new(&bytes).expect_signature(expected)
}

fn read_record<T: FromBytes, R: Read>(reader: &mut R, what: &str) -> Result<T> {
    let bytes = read_vec(reader, std::mem::size_of::<T>(), what)?;
    BinaryReader::new(&bytes).read_struct()
}

fn read_vec<R: Read>(reader: &mut R, len: usize, what: &str) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).map_err(|e| Error::truncated(e, what))?;
    Ok(bytes)
}

fn skip<R: Read>(reader: &mut R, len: u64, what: &str) -> Result<()> {
    let skipped = io::copy(&mut reader.take(len), &mut io::sink())?;
    if skipped != len {
        return Err(Error::Format(format!("truncated {what}")));
    }
    Ok(())
}
