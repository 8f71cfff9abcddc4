//! Random-access byte sources.
//!
//! Archives are parsed and transformed through [`ByteSource`], which only
//! supports positioned reads. There is no shared cursor: every
//! [`SourceReader`] tracks its own position, so any number of readers can be
//! open over the same source at once, including from different threads.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use memmap2::Mmap;

use crate::{Error, LimitedReader, Result};

/// A random-access source of bytes.
pub trait ByteSource: Send + Sync {
    /// Total number of bytes in the source.
    fn len(&self) -> u64;

    /// Whether the source is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read; zero means `offset` is at or past the end.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Fill `buf` completely from `offset`.
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.read_at(offset, buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "failed to fill whole buffer",
                    ))
                }
                Ok(n) => {
                    offset += n as u64;
                    buf = &mut buf[n..];
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Read `len` bytes at `offset` into a new buffer.
    ///
    /// Fails with [`Error::Format`] if the range extends past the end of the source.
    fn read_range(&self, offset: u64, len: u64) -> Result<Vec<u8>> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| {
                Error::Format(format!(
                    "range {offset}+{len} exceeds source length {}",
                    self.len()
                ))
            })?;
        let size = usize::try_from(end - offset)
            .map_err(|_| Error::InvalidArgument(format!("range length {len} does not fit in memory")))?;

        let mut buf = vec![0u8; size];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }
}

impl ByteSource for [u8] {
    #[inline]
    fn len(&self) -> u64 {
        <[u8]>::len(self) as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= <[u8]>::len(self) {
            return Ok(0);
        }
        let count = buf.len().min(<[u8]>::len(self) - start);
        buf[..count].copy_from_slice(&self[start..start + count]);
        Ok(count)
    }
}

impl ByteSource for Vec<u8> {
    #[inline]
    fn len(&self) -> u64 {
        self.as_slice().len() as u64
    }

    #[inline]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self.as_slice().read_at(offset, buf)
    }
}

impl ByteSource for Mmap {
    #[inline]
    fn len(&self) -> u64 {
        self[..].len() as u64
    }

    #[inline]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        self[..].read_at(offset, buf)
    }
}

impl<T: ByteSource + ?Sized> ByteSource for &T {
    #[inline]
    fn len(&self) -> u64 {
        (**self).len()
    }

    #[inline]
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read_at(offset, buf)
    }
}

/// A file read with positioned reads (`pread` on Unix, `seek_read` on Windows).
#[derive(Debug)]
pub struct FileSource {
    file: File,
    len: u64,
}

impl FileSource {
    /// Open the file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    /// Wrap an already opened file.
    pub fn from_file(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl ByteSource for FileSource {
    #[inline]
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.len {
            return Ok(0);
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            self.file.read_at(buf, offset)
        }

        #[cfg(windows)]
        {
            use std::os::windows::fs::FileExt;
            self.file.seek_read(buf, offset)
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = buf;
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "positioned reads are not supported on this platform",
            ))
        }
    }
}

/// An [`io::Read`] cursor over a [`ByteSource`], from a start offset to the end.
///
/// The reader is deliberately unbounded; wrap it with [`window`] to stop at a
/// declared boundary.
#[derive(Debug)]
pub struct SourceReader<'a, S: ByteSource + ?Sized> {
    source: &'a S,
    position: u64,
}

impl<'a, S: ByteSource + ?Sized> SourceReader<'a, S> {
    /// Start reading `source` at `offset`.
    pub fn new(source: &'a S, offset: u64) -> Self {
        Self {
            source,
            position: offset,
        }
    }

    /// Absolute position of the next byte to be read.
    #[inline]
    pub fn position(&self) -> u64 {
        self.position
    }
}

impl<S: ByteSource + ?Sized> Read for SourceReader<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.source.read_at(self.position, buf)?;
        self.position += read as u64;
        Ok(read)
    }
}

/// Open an independent reader over `len` bytes of `source` starting at `offset`.
pub fn window<S: ByteSource + ?Sized>(
    source: &S,
    offset: u64,
    len: u64,
) -> Result<LimitedReader<SourceReader<'_, S>>> {
    let limit = i64::try_from(len)
        .map_err(|_| Error::InvalidArgument(format!("window length {len} is too large")))?;
    LimitedReader::new(SourceReader::new(source, offset), limit)
}
