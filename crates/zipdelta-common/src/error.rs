//! Error types for zipdelta.

use std::io;

use thiserror::Error;

/// Errors that can occur while parsing archives, planning, or applying patches.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from an underlying source or sink.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed or unsupported container structure.
    #[error("malformed archive: {0}")]
    Format(String),

    /// A record did not start with the expected signature.
    #[error("invalid signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },

    /// End of buffer reached while reading a record.
    #[error("unexpected end of data: needed {needed} bytes but only {available} available")]
    UnexpectedEof { needed: usize, available: usize },

    /// Bad constructor or configuration input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Compression method this crate cannot process.
    #[error("unsupported compression method: {0}")]
    UnsupportedCodec(u16),

    /// The local deflate implementation failed the bit-exactness probe.
    #[error("local deflate implementation does not reproduce reference output")]
    CompatibilityUnavailable,

    /// Decompression, recompression or patch application produced unexpected bytes.
    #[error("corrupt data: {0}")]
    Corruption(String),
}

impl Error {
    /// Whether this error describes malformed container structure.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::Format(_) | Error::InvalidSignature { .. } | Error::UnexpectedEof { .. }
        )
    }

    /// Convert an I/O error raised while reading a structural record.
    ///
    /// A short read means the record is truncated, which is a format problem
    /// rather than a transport one.
    pub fn truncated(err: io::Error, what: &str) -> Self {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            Error::Format(format!("truncated {what}"))
        } else {
            Error::Io(err)
        }
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
