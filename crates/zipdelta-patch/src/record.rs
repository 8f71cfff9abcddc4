//! Per-entry plan records carried inside a patch.

use std::io::{Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use zipdelta_common::{Error, Result};

use crate::option::{UncompressionExplanation, UncompressionOption};

/// The structural facts about one side of a planned entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntryDescriptor {
    /// Compression method id as written in the archive.
    pub method: u16,
    /// Deflate level that reproduces the payload, when known.
    pub deflate_level: Option<u8>,
    /// Offset of the compressed payload in its archive.
    pub data_offset: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// CRC-32 of the uncompressed payload.
    pub crc32: u32,
}

impl EntryDescriptor {
    /// Serialized size in bytes.
    pub const WIRE_SIZE: usize = 2 + 1 + 8 + 8 + 8 + 4;

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let method = read_u16(reader)?;
        let deflate_level = match read_u8(reader)? {
            0 => None,
            level @ 1..=9 => Some(level),
            other => return Err(Error::Format(format!("invalid deflate level {other}"))),
        };

        Ok(Self {
            method,
            deflate_level,
            data_offset: read_u64(reader)?,
            compressed_size: read_u64(reader)?,
            uncompressed_size: read_u64(reader)?,
            crc32: read_u32(reader)?,
        })
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(self.method)?;
        writer.write_u8(self.deflate_level.unwrap_or(0))?;
        writer.write_u64::<BigEndian>(self.data_offset)?;
        writer.write_u64::<BigEndian>(self.compressed_size)?;
        writer.write_u64::<BigEndian>(self.uncompressed_size)?;
        writer.write_u32::<BigEndian>(self.crc32)?;
        Ok(())
    }
}

/// One planned entry pair, as needed to rebuild the new archive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PlanRecord {
    /// Path of the entry in the new archive.
    pub path: Vec<u8>,
    pub option: UncompressionOption,
    pub explanation: UncompressionExplanation,
    pub old: EntryDescriptor,
    pub new: EntryDescriptor,
    /// Offset of the new entry's uncompressed bytes in the new delta-friendly
    /// blob. Present exactly when the new side is uncompressed.
    pub new_delta_friendly_offset: Option<u64>,
}

impl PlanRecord {
    /// Check the option, explanation and recompression fields agree.
    pub fn validate(&self) -> Result<()> {
        let path = String::from_utf8_lossy(&self.path);
        if self.explanation == UncompressionExplanation::New {
            return Err(Error::Format(format!("plan record for new entry {path}")));
        }
        if self.explanation.implied_option() != self.option {
            return Err(Error::Format(format!(
                "{path}: option {:?} cannot be explained by {:?}",
                self.option, self.explanation
            )));
        }
        if self.option.uncompresses_new() != self.new_delta_friendly_offset.is_some() {
            return Err(Error::Format(format!(
                "{path}: delta-friendly offset must be present exactly when the new side is uncompressed"
            )));
        }
        if self.option.uncompresses_new() && self.new.deflate_level.is_none() {
            return Err(Error::Format(format!("{path}: recompression level is missing")));
        }
        Ok(())
    }

    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let path_len = read_u32(reader)? as u64;
        let path = read_bytes(reader, path_len, "entry path")?;
        let option = UncompressionOption::from_tag(read_u8(reader)?)?;
        let explanation = UncompressionExplanation::from_tag(read_u8(reader)?)?;
        let old = EntryDescriptor::read(reader)?;
        let new = EntryDescriptor::read(reader)?;
        let new_delta_friendly_offset = match read_u8(reader)? {
            0 => {
                read_u64(reader)?;
                None
            }
            1 => Some(read_u64(reader)?),
            other => return Err(Error::Format(format!("invalid presence flag {other}"))),
        };

        let record = Self {
            path,
            option,
            explanation,
            old,
            new,
            new_delta_friendly_offset,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        let path_len = u32::try_from(self.path.len())
            .map_err(|_| Error::InvalidArgument(format!("path of {} bytes is too long", self.path.len())))?;
        writer.write_u32::<BigEndian>(path_len)?;
        writer.write_all(&self.path)?;
        writer.write_u8(self.option.tag())?;
        writer.write_u8(self.explanation.tag())?;
        self.old.write(writer)?;
        self.new.write(writer)?;
        writer.write_u8(u8::from(self.new_delta_friendly_offset.is_some()))?;
        writer.write_u64::<BigEndian>(self.new_delta_friendly_offset.unwrap_or(0))?;
        Ok(())
    }
}

// Short reads of a patch are format errors, not transport errors.
pub(crate) fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    reader.read_u8().map_err(|e| Error::truncated(e, "patch"))
}

pub(crate) fn read_u16<R: Read>(reader: &mut R) -> Result<u16> {
    reader.read_u16::<BigEndian>().map_err(|e| Error::truncated(e, "patch"))
}

pub(crate) fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    reader.read_u32::<BigEndian>().map_err(|e| Error::truncated(e, "patch"))
}

pub(crate) fn read_u64<R: Read>(reader: &mut R) -> Result<u64> {
    reader.read_u64::<BigEndian>().map_err(|e| Error::truncated(e, "patch"))
}

pub(crate) fn read_bytes<R: Read>(reader: &mut R, len: u64, what: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader.take(len).read_to_end(&mut bytes)?;
    if bytes.len() as u64 != len {
        return Err(Error::Format(format!("truncated {what}")));
    }
    Ok(bytes)
}
