//! Bit-exact deflate handling for zipdelta.
//!
//! - [`codec`] - raw deflate compression and decompression
//! - [`compatibility`] - the check that the local compressor reproduces stock zlib
//! - [`divination`] - recovery of the level that produced a stream
//! - [`delta_friendly`] - archives with payloads uncompressed in place
//!
//! The compressor is the bundled stock zlib (through `flate2` and a statically
//! built `libz-sys`), so recompression matches what most zip writers produce.

pub mod codec;
pub mod compatibility;
pub mod delta_friendly;
pub mod divination;

pub use codec::{compress_raw, uncompress_entry, uncompress_raw, DeflateParameters};
pub use compatibility::{check_compatibility, DeflateCapability};
pub use delta_friendly::{generate_delta_friendly_blob, CompressedRange, DeltaFriendlyBlob};
pub use divination::{divine_entry, divine_parameters};
pub use zipdelta_common::{Error, Result};
