//! In-memory zip archive builder.

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::{Compress, Compression, FlushCompress, Status};
use zipdelta_common::crc::crc32;

const LOCAL_HEADER_SIGNATURE: u32 = 0x04034b50;
const DATA_DESCRIPTOR_SIGNATURE: u32 = 0x08074b50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014b50;
const EOCD_SIGNATURE: u32 = 0x06054b50;
const ZIP64_EOCD_SIGNATURE: u32 = 0x06064b50;
const ZIP64_LOCATOR_SIGNATURE: u32 = 0x07064b50;

const DOS_TIME: u16 = 0x6000;
const DOS_DATE: u16 = 0x5021;
const DATA_DESCRIPTOR_FLAG: u16 = 1 << 3;

/// Compress `data` into a raw deflate stream in a single call.
pub fn deflate_raw(data: &[u8], level: u32) -> Vec<u8> {
    let mut compress = Compress::new(Compression::new(level), false);
    let mut out = Vec::with_capacity(data.len() + data.len() / 8 + 64);
    loop {
        let consumed = compress.total_in() as usize;
        match compress.compress_vec(&data[consumed..], &mut out, FlushCompress::Finish) {
            Ok(Status::StreamEnd) => return out,
            Ok(_) => out.reserve(out.capacity().max(64)),
            Err(e) => panic!("raw deflate failed: {e}"),
        }
    }
}

/// Flag bits a typical zip tool writes for a deflate level.
fn hint_flags(level: u32) -> u16 {
    match level {
        8 | 9 => 0b010,
        2 => 0b100,
        1 => 0b110,
        _ => 0,
    }
}

/// One entry to be written by [`ArchiveBuilder`].
#[derive(Debug, Clone)]
pub struct TestEntry {
    path: Vec<u8>,
    method: u16,
    flags: u16,
    crc32: u32,
    uncompressed_size: u64,
    payload: Vec<u8>,
    local_extra: Vec<u8>,
    central_extra: Vec<u8>,
    data_descriptor: bool,
}

impl TestEntry {
    /// An uncompressed entry.
    pub fn stored(path: impl Into<Vec<u8>>, data: &[u8]) -> Self {
        Self::with_payload(path, 0, data.to_vec(), crc32(data), data.len() as u64)
    }

    /// A deflate entry compressed at `level`, with matching hint flags.
    pub fn deflated(path: impl Into<Vec<u8>>, data: &[u8], level: u32) -> Self {
        Self::with_payload(path, 8, deflate_raw(data, level), crc32(data), data.len() as u64)
            .with_flags(hint_flags(level))
    }

    /// An entry with an arbitrary method and an already encoded payload.
    pub fn with_payload(
        path: impl Into<Vec<u8>>,
        method: u16,
        payload: Vec<u8>,
        crc32: u32,
        uncompressed_size: u64,
    ) -> Self {
        Self {
            path: path.into(),
            method,
            flags: 0,
            crc32,
            uncompressed_size,
            payload,
            local_extra: Vec::new(),
            central_extra: Vec::new(),
            data_descriptor: false,
        }
    }

    /// Replace the general purpose flags.
    pub fn with_flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    /// Write sizes and CRC in a data descriptor after the payload.
    pub fn with_data_descriptor(mut self) -> Self {
        self.data_descriptor = true;
        self
    }

    /// Extra field bytes written in the local header only.
    pub fn with_local_extra(mut self, extra: Vec<u8>) -> Self {
        self.local_extra = extra;
        self
    }

    /// Extra field bytes written in the central directory only.
    pub fn with_central_extra(mut self, extra: Vec<u8>) -> Self {
        self.central_extra = extra;
        self
    }

    fn flags(&self) -> u16 {
        if self.data_descriptor {
            self.flags | DATA_DESCRIPTOR_FLAG
        } else {
            self.flags
        }
    }
}

/// Where one entry ended up in a built archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryLayout {
    pub path: Vec<u8>,
    pub local_header_offset: u64,
    pub data_offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

/// A built archive and its layout.
#[derive(Debug, Clone)]
pub struct BuiltArchive {
    pub bytes: Vec<u8>,
    /// Entries in file order.
    pub entries: Vec<EntryLayout>,
    pub central_directory_offset: u64,
    pub eocd_offset: u64,
}

impl BuiltArchive {
    /// The raw payload of the first entry named `path`.
    pub fn payload(&self, path: &[u8]) -> Option<&[u8]> {
        self.entries.iter().find(|e| e.path == path).map(|e| {
            let start = e.data_offset as usize;
            &self.bytes[start..start + e.compressed_size as usize]
        })
    }
}

/// Builds zip archives in memory.
///
/// # Example
///
/// ```
/// use zipdelta_test_utils::{ArchiveBuilder, TestEntry};
///
/// let archive = ArchiveBuilder::new()
///     .entry(TestEntry::stored("a.txt", b"hello"))
///     .entry(TestEntry::deflated("b.txt", b"hello hello hello", 6))
///     .comment(b"built for a test")
///     .build();
///
/// assert_eq!(archive.entries.len(), 2);
/// assert_eq!(archive.payload(b"a.txt"), Some(&b"hello"[..]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ArchiveBuilder {
    entries: Vec<TestEntry>,
    comment: Vec<u8>,
    reverse_central_directory: bool,
    zip64: bool,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry; entries are written in the order they are added.
    pub fn entry(mut self, entry: TestEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Set the archive comment.
    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Write the central directory in reverse file order.
    pub fn reverse_central_directory(mut self) -> Self {
        self.reverse_central_directory = true;
        self
    }

    /// Saturate every size and offset field and write the ZIP64 records.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(&self) -> BuiltArchive {
        let mut out = Vec::new();
        let mut layouts = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let local_header_offset = out.len() as u64;
            write_local_header(&mut out, entry);
            let data_offset = out.len() as u64;
            out.extend_from_slice(&entry.payload);

            if entry.data_descriptor {
                put_u32(&mut out, DATA_DESCRIPTOR_SIGNATURE);
                put_u32(&mut out, entry.crc32);
                put_u32(&mut out, entry.payload.len() as u32);
                put_u32(&mut out, entry.uncompressed_size as u32);
            }

            layouts.push(EntryLayout {
                path: entry.path.clone(),
                local_header_offset,
                data_offset,
                compressed_size: entry.payload.len() as u64,
                uncompressed_size: entry.uncompressed_size,
            });
        }

        let central_directory_offset = out.len() as u64;
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        if self.reverse_central_directory {
            order.reverse();
        }
        for index in order {
            write_central_record(
                &mut out,
                &self.entries[index],
                layouts[index].local_header_offset,
                self.zip64,
            );
        }
        let central_directory_size = out.len() as u64 - central_directory_offset;
        let count = self.entries.len() as u64;

        if self.zip64 {
            let record_offset = out.len() as u64;
            put_u32(&mut out, ZIP64_EOCD_SIGNATURE);
            put_u64(&mut out, 44);
            put_u16(&mut out, 45);
            put_u16(&mut out, 45);
            put_u32(&mut out, 0);
            put_u32(&mut out, 0);
            put_u64(&mut out, count);
            put_u64(&mut out, count);
            put_u64(&mut out, central_directory_size);
            put_u64(&mut out, central_directory_offset);

            put_u32(&mut out, ZIP64_LOCATOR_SIGNATURE);
            put_u32(&mut out, 0);
            put_u64(&mut out, record_offset);
            put_u32(&mut out, 1);
        }

        let eocd_offset = out.len() as u64;
        put_u32(&mut out, EOCD_SIGNATURE);
        put_u16(&mut out, 0);
        put_u16(&mut out, 0);
        if self.zip64 {
            put_u16(&mut out, 0xFFFF);
            put_u16(&mut out, 0xFFFF);
            put_u32(&mut out, u32::MAX);
            put_u32(&mut out, u32::MAX);
        } else {
            put_u16(&mut out, count as u16);
            put_u16(&mut out, count as u16);
            put_u32(&mut out, central_directory_size as u32);
            put_u32(&mut out, central_directory_offset as u32);
        }
        put_u16(&mut out, self.comment.len() as u16);
        out.extend_from_slice(&self.comment);

        BuiltArchive {
            bytes: out,
            entries: layouts,
            central_directory_offset,
            eocd_offset,
        }
    }
}

fn write_local_header(out: &mut Vec<u8>, entry: &TestEntry) {
    let (crc, compressed, uncompressed) = if entry.data_descriptor {
        (0, 0, 0)
    } else {
        (entry.crc32, entry.payload.len() as u32, entry.uncompressed_size as u32)
    };

    put_u32(out, LOCAL_HEADER_SIGNATURE);
    put_u16(out, 20);
    put_u16(out, entry.flags());
    put_u16(out, entry.method);
    put_u16(out, DOS_TIME);
    put_u16(out, DOS_DATE);
    put_u32(out, crc);
    put_u32(out, compressed);
    put_u32(out, uncompressed);
    put_u16(out, entry.path.len() as u16);
    put_u16(out, entry.local_extra.len() as u16);
    out.extend_from_slice(&entry.path);
    out.extend_from_slice(&entry.local_extra);
}

fn write_central_record(out: &mut Vec<u8>, entry: &TestEntry, local_header_offset: u64, zip64: bool) {
    let mut extra = Vec::new();
    if zip64 {
        put_u16(&mut extra, 0x0001);
        put_u16(&mut extra, 24);
        put_u64(&mut extra, entry.uncompressed_size);
        put_u64(&mut extra, entry.payload.len() as u64);
        put_u64(&mut extra, local_header_offset);
    }
    extra.extend_from_slice(&entry.central_extra);

    let (compressed, uncompressed, offset) = if zip64 {
        (u32::MAX, u32::MAX, u32::MAX)
    } else {
        (
            entry.payload.len() as u32,
            entry.uncompressed_size as u32,
            local_header_offset as u32,
        )
    };

    put_u32(out, CENTRAL_DIRECTORY_SIGNATURE);
    put_u16(out, if zip64 { 45 } else { 20 });
    put_u16(out, if zip64 { 45 } else { 20 });
    put_u16(out, entry.flags());
    put_u16(out, entry.method);
    put_u16(out, DOS_TIME);
    put_u16(out, DOS_DATE);
    put_u32(out, entry.crc32);
    put_u32(out, compressed);
    put_u32(out, uncompressed);
    put_u16(out, entry.path.len() as u16);
    put_u16(out, extra.len() as u16);
    put_u16(out, 0);
    put_u16(out, 0);
    put_u16(out, 0);
    put_u32(out, 0);
    put_u32(out, offset);
    out.extend_from_slice(&entry.path);
    out.extend_from_slice(&extra);
}

// Writes into a Vec cannot fail.
fn put_u16(out: &mut Vec<u8>, value: u16) {
    let _ = out.write_u16::<LittleEndian>(value);
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    let _ = out.write_u32::<LittleEndian>(value);
}

fn put_u64(out: &mut Vec<u8>, value: u64) {
    let _ = out.write_u64::<LittleEndian>(value);
}
