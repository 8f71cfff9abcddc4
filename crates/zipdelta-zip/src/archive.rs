//! Memory-mapped zip archive.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;
use zipdelta_common::Result;

use crate::entry::ZipEntry;
use crate::parser::{read_listing, CentralDirectoryMetadata, ParseOptions};

/// A zip archive opened from disk.
///
/// The file is memory-mapped and its structure listed once; the map itself
/// is a [`ByteSource`](zipdelta_common::ByteSource) that patch generation and
/// application read from directly.
pub struct ZipArchive {
    /// Memory-mapped file data
    mmap: Mmap,
    /// Archive file name
    name: String,
    /// Central directory location
    central_directory: CentralDirectoryMetadata,
    /// Entries in file order
    entries: Vec<ZipEntry>,
}

impl ZipArchive {
    /// Open and list an archive with default parse options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, &ParseOptions::default())
    }

    /// Open and list an archive.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: &ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: the map is read-only and the archive is not expected to be
        // modified while it is open.
        let mmap = unsafe { Mmap::map(&file)? };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let listing = read_listing(&mmap, options)?;

        Ok(Self {
            mmap,
            name,
            central_directory: listing.central_directory,
            entries: listing.entries,
        })
    }

    /// Get the archive name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the mapped archive bytes.
    #[inline]
    pub fn source(&self) -> &Mmap {
        &self.mmap
    }

    /// Get the total archive size in bytes.
    #[inline]
    pub fn len(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Check if the archive file is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Get the central directory location.
    #[inline]
    pub fn central_directory(&self) -> &CentralDirectoryMetadata {
        &self.central_directory
    }

    /// Get all entries in file order.
    #[inline]
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Find the first entry with the given path.
    pub fn find(&self, path: &[u8]) -> Option<&ZipEntry> {
        self.entries.iter().find(|e| e.path() == path)
    }

    /// Read an entry's compressed payload.
    pub fn read_compressed(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        entry.read_compressed(&self.mmap)
    }
}

impl std::fmt::Debug for ZipArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZipArchive")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .finish()
    }
}
