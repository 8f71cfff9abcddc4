//! Minimal structural zip parser for zipdelta.
//!
//! This crate reads just enough of a zip, jar or apk container to locate
//! every entry's compressed payload:
//!
//! - the end of central directory record (including ZIP64)
//! - every central directory record
//! - every local header, bounded by the start of the next entry
//!
//! It never decompresses anything and it is not a general-purpose zip
//! library. The input is assumed to be well formed; malformed input fails
//! loudly with a format error.
//!
//! # Example
//!
//! ```no_run
//! use zipdelta_zip::ZipArchive;
//!
//! let archive = ZipArchive::open("app.apk")?;
//! for entry in archive.entries() {
//!     println!("{}: {} -> {} bytes", entry.path_lossy(), entry.uncompressed_size(), entry.compressed_size());
//! }
//! # Ok::<(), zipdelta_common::Error>(())
//! ```

mod archive;
mod entry;
mod parser;
pub mod zip;

pub use archive::ZipArchive;
pub use entry::ZipEntry;
pub use parser::{
    list_entries, list_entries_with_options, locate_eocd, parse_central_directory_entry, parse_eocd,
    parse_local_header_and_get_data_offset, CentralDirectoryMetadata, ParseOptions,
    DEFAULT_EOCD_SEARCH_WINDOW,
};
pub use zip::{CompressionMethod, DeflateHint};
pub use zipdelta_common::{Error, Result};
