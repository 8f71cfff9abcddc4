//! Uncompression options and the reasons for choosing them.

use zipdelta_common::{Error, Result};

/// Which sides of a matched entry pair are uncompressed before diffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UncompressionOption {
    /// Both payloads are diffed as they are in the archives.
    UncompressNeither,
    /// Only the old payload is uncompressed.
    UncompressOld,
    /// Only the new payload is uncompressed; it is recompressed on apply.
    UncompressNew,
    /// Both payloads are uncompressed; the new one is recompressed on apply.
    UncompressBoth,
}

impl UncompressionOption {
    /// Whether the old payload is uncompressed.
    #[inline]
    pub const fn uncompresses_old(self) -> bool {
        matches!(self, Self::UncompressOld | Self::UncompressBoth)
    }

    /// Whether the new payload is uncompressed, and so must be recompressed on apply.
    #[inline]
    pub const fn uncompresses_new(self) -> bool {
        matches!(self, Self::UncompressNew | Self::UncompressBoth)
    }

    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::UncompressNeither => 0,
            Self::UncompressOld => 1,
            Self::UncompressNew => 2,
            Self::UncompressBoth => 3,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::UncompressNeither,
            1 => Self::UncompressOld,
            2 => Self::UncompressNew,
            3 => Self::UncompressBoth,
            other => return Err(Error::Format(format!("unknown uncompression option {other}"))),
        })
    }
}

/// Why an entry was given its uncompression option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UncompressionExplanation {
    /// The entry has no counterpart in the old archive.
    New,
    /// The compressed bytes are identical.
    CompressedBytesIdentical,
    /// Both entries are deflate compressed and the compressed bytes differ.
    CompressedBytesChanged,
    /// Both entries are stored and their bytes differ.
    BothEntriesUncompressed,
    /// The old entry is deflate compressed, the new one stored.
    CompressedChangedToUncompressed,
    /// The old entry is stored, the new one deflate compressed.
    UncompressedChangedToCompressed,
    /// An entry uses a method other than stored or deflate, or cannot be read.
    Unsuitable,
    /// The new entry cannot be recompressed bit-exactly.
    DeflateUnsuitable,
    /// A resource limit was reached.
    ResourceConstrained,
}

impl UncompressionExplanation {
    /// The only option this explanation can accompany.
    pub const fn implied_option(self) -> UncompressionOption {
        match self {
            Self::CompressedBytesChanged => UncompressionOption::UncompressBoth,
            Self::CompressedChangedToUncompressed => UncompressionOption::UncompressOld,
            Self::UncompressedChangedToCompressed => UncompressionOption::UncompressNew,
            Self::New
            | Self::CompressedBytesIdentical
            | Self::BothEntriesUncompressed
            | Self::Unsuitable
            | Self::DeflateUnsuitable
            | Self::ResourceConstrained => UncompressionOption::UncompressNeither,
        }
    }

    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::New => 0,
            Self::CompressedBytesIdentical => 1,
            Self::CompressedBytesChanged => 2,
            Self::BothEntriesUncompressed => 3,
            Self::CompressedChangedToUncompressed => 4,
            Self::UncompressedChangedToCompressed => 5,
            Self::Unsuitable => 6,
            Self::DeflateUnsuitable => 7,
            Self::ResourceConstrained => 8,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => Self::New,
            1 => Self::CompressedBytesIdentical,
            2 => Self::CompressedBytesChanged,
            3 => Self::BothEntriesUncompressed,
            4 => Self::CompressedChangedToUncompressed,
            5 => Self::UncompressedChangedToCompressed,
            6 => Self::Unsuitable,
            7 => Self::DeflateUnsuitable,
            8 => Self::ResourceConstrained,
            other => return Err(Error::Format(format!("unknown uncompression explanation {other}"))),
        })
    }
}
