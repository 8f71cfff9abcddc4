//! ZIP format structures.
//!
//! This module contains the fixed-size records of the zip container,
//! including the ZIP64 end of central directory records. Every record is laid
//! out exactly as on disk, without its leading 4-byte signature.

pub mod central_dir;
mod eocd;
mod local;

pub use central_dir::CentralDirectoryHeader;
pub use eocd::{Eocd64Locator, Eocd64Record, EocdRecord};
pub use local::LocalFileHeader;

/// General purpose flag bits that matter for patching.
pub mod flags {
    /// Entry is encrypted.
    pub const ENCRYPTED: u16 = 1 << 0;
    /// Deflate option bits (1 and 2).
    pub const DEFLATE_OPTION_MASK: u16 = 0b110;
    /// Sizes and CRC follow the payload in a data descriptor.
    pub const DATA_DESCRIPTOR: u16 = 1 << 3;
}

/// Compression method of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    /// No compression (stored).
    Stored,
    /// DEFLATE compression.
    Deflate,
    /// Any other method; treated as an opaque payload.
    Other(u16),
}

impl CompressionMethod {
    /// The method id as written in the archive.
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Stored => 0,
            Self::Deflate => 8,
            Self::Other(id) => id,
        }
    }
}

impl From<u16> for CompressionMethod {
    fn from(value: u16) -> Self {
        match value {
            0 => Self::Stored,
            8 => Self::Deflate,
            other => Self::Other(other),
        }
    }
}

/// Compression level hint carried in flag bits 1 and 2 of deflate entries.
///
/// Writers set these bits inconsistently, so the hint only orders the search
/// for the real parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeflateHint {
    Normal,
    Maximum,
    Fast,
    SuperFast,
}

impl DeflateHint {
    /// Decode the hint from a general purpose flag word.
    pub const fn from_flags(flags: u16) -> Self {
        match (flags & self::flags::DEFLATE_OPTION_MASK) >> 1 {
            0 => Self::Normal,
            1 => Self::Maximum,
            2 => Self::Fast,
            _ => Self::SuperFast,
        }
    }
}
