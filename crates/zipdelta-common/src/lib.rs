//! Common utilities for zipdelta.
//!
//! This crate provides the foundations shared by every zipdelta crate:
//!
//! - [`Error`] - the error taxonomy used across parsing, planning and application
//! - [`ByteSource`] - random-access, positioned reads with independent cursors
//! - [`LimitedReader`] - a reader that never yields more than a fixed number of bytes
//! - [`BinaryReader`] - zero-copy little-endian reading from byte slices
//! - [`crc`] - CRC-32 helpers for verifying entry contents

mod error;
mod limited;
mod reader;
mod source;

pub mod crc;

pub use error::{Error, Result};
pub use limited::LimitedReader;
pub use reader::BinaryReader;
pub use source::{window, ByteSource, FileSource, SourceReader};

/// Re-export zerocopy traits for convenience
pub use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};
