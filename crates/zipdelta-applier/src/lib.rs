//! Patch application for zipdelta.
//!
//! The applier rebuilds the old delta-friendly blob from the old archive,
//! runs the external delta applier to get the new delta-friendly blob, and
//! recompresses every entry the generator uncompressed so that the result is
//! byte-for-byte the original new archive.

mod applier;
mod recompress;

pub use applier::PatchApplier;
pub use recompress::{recompress_ranges, RecompressedRange};
pub use zipdelta_common::{Error, Result};
