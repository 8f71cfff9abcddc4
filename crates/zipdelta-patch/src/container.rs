//! The patch container format.
//!
//! All integers are big-endian.
//!
//! ```text
//! magic              8 bytes  "ZDPATCH1"
//! flags              u32      always zero
//! old archive size   u64
//! new archive size   u64
//! record count       u32
//! records            PlanRecord * record count
//! old blob size      u64      length of the old delta-friendly blob
//! new blob size      u64      length of the new delta-friendly blob
//! delta length       u64
//! delta              bytes    produced by the external differ
//! ```

use std::io::{Read, Write};

use byteorder::{BigEndian, WriteBytesExt};
use tracing::trace;
use zipdelta_common::{Error, Result};

use crate::record::{read_bytes, read_u32, read_u64, PlanRecord};

/// Magic bytes at the start of every patch.
pub const MAGIC: &[u8; 8] = b"ZDPATCH1";

/// A complete patch: plan metadata plus the delta between delta-friendly blobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchContainer {
    pub old_archive_size: u64,
    pub new_archive_size: u64,
    /// One record per planned entry pair, in plan order.
    pub records: Vec<PlanRecord>,
    pub old_blob_size: u64,
    pub new_blob_size: u64,
    pub delta: Vec<u8>,
}

impl PatchContainer {
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(MAGIC)?;
        writer.write_u32::<BigEndian>(0)?;
        writer.write_u64::<BigEndian>(self.old_archive_size)?;
        writer.write_u64::<BigEndian>(self.new_archive_size)?;

        let count = u32::try_from(self.records.len())
            .map_err(|_| Error::InvalidArgument(format!("{} plan records", self.records.len())))?;
        writer.write_u32::<BigEndian>(count)?;
        for record in &self.records {
            record.write(writer)?;
        }

        writer.write_u64::<BigEndian>(self.old_blob_size)?;
        writer.write_u64::<BigEndian>(self.new_blob_size)?;
        writer.write_u64::<BigEndian>(self.delta.len() as u64)?;
        writer.write_all(&self.delta)?;
        Ok(())
    }

    /// Serialize into a new buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(64 + self.delta.len());
        self.write(&mut bytes)?;
        Ok(bytes)
    }

    /// Read a container, leaving anything after it unread.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = read_bytes(reader, MAGIC.len() as u64, "patch header")?;
        if magic != MAGIC {
            return Err(Error::Format("not a zipdelta patch".into()));
        }
        let flags = read_u32(reader)?;
        if flags != 0 {
            return Err(Error::Format(format!("unsupported patch flags {flags:#010x}")));
        }

        let old_archive_size = read_u64(reader)?;
        let new_archive_size = read_u64(reader)?;

        let count = read_u32(reader)? as usize;
        let mut records = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            records.push(PlanRecord::read(reader)?);
        }

        let old_blob_size = read_u64(reader)?;
        let new_blob_size = read_u64(reader)?;
        let delta_len = read_u64(reader)?;
        let delta = read_bytes(reader, delta_len, "delta")?;

        trace!(records = records.len(), delta_len, "read patch container");
        Ok(Self {
            old_archive_size,
            new_archive_size,
            records,
            old_blob_size,
            new_blob_size,
            delta,
        })
    }

    /// Parse a container that must span all of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = bytes;
        let container = Self::read(&mut reader)?;
        if !reader.is_empty() {
            return Err(Error::Format(format!(
                "{} trailing bytes after patch",
                reader.len()
            )));
        }
        Ok(container)
    }
}
