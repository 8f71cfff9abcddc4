//! Bounded reads over an arbitrary reader.

use std::io::{self, Read};

use crate::{Error, Result};

/// A reader that yields at most a fixed number of bytes from its inner reader.
///
/// Once the limit is used up every read reports end-of-stream and the inner
/// reader is not touched again, no matter what it would still produce. Every
/// read of an entry's bytes goes through one of these so nothing can run past
/// the boundary the archive declares, even when the inner reader itself is
/// unbounded.
#[derive(Debug)]
pub struct LimitedReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> LimitedReader<R> {
    /// Wrap `inner`, allowing at most `limit` bytes to be read.
    ///
    /// Fails with [`Error::InvalidArgument`] when `limit` is negative.
    pub fn new(inner: R, limit: i64) -> Result<Self> {
        let remaining = u64::try_from(limit)
            .map_err(|_| Error::InvalidArgument(format!("read limit must not be negative: {limit}")))?;
        Ok(Self { inner, remaining })
    }

    /// Bytes that may still be read.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Unwrap the inner reader.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for LimitedReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let max = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let read = self.inner.read(&mut buf[..max])?;
        self.remaining -= read as u64;
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// A reader that never ends and counts how often it is asked for data.
    #[derive(Default)]
    struct ForeverReader {
        calls: usize,
    }

    impl Read for ForeverReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.calls += 1;
            buf.fill(0);
            Ok(buf.len())
        }
    }

    fn read_byte<R: Read>(reader: &mut R) -> Option<u8> {
        let mut byte = [0u8; 1];
        match reader.read(&mut byte).unwrap() {
            0 => None,
            _ => Some(byte[0]),
        }
    }

    #[test]
    fn test_limit_zero() {
        let mut reader = LimitedReader::new(ForeverReader::default(), 0).unwrap();
        assert_eq!(read_byte(&mut reader), None);
        assert_eq!(reader.into_inner().calls, 0);
    }

    #[test]
    fn test_limit_one() {
        let mut reader = LimitedReader::new(ForeverReader::default(), 1).unwrap();
        assert_eq!(read_byte(&mut reader), Some(0));
        assert_eq!(read_byte(&mut reader), None);
    }

    #[test]
    fn test_limit_hundred() {
        let mut reader = LimitedReader::new(ForeverReader::default(), 100).unwrap();
        let mut buf = [0u8; 1000];
        assert_eq!(reader.read(&mut buf).unwrap(), 100);
        assert_eq!(read_byte(&mut reader), None);
    }

    #[test]
    fn test_exhausted_reader_is_not_queried() {
        let mut reader = LimitedReader::new(ForeverReader::default(), 10).unwrap();
        let mut buf = [0u8; 10];
        assert_eq!(reader.read(&mut buf).unwrap(), 10);
        for _ in 0..5 {
            assert_eq!(reader.read(&mut buf).unwrap(), 0);
        }
        assert_eq!(reader.into_inner().calls, 1);
    }

    #[test]
    fn test_negative_limit() {
        assert!(matches!(
            LimitedReader::new(ForeverReader::default(), -1),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_short_inner_reader() {
        let data = [1u8, 2, 3];
        let mut reader = LimitedReader::new(&data[..], 10).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
        assert_eq!(reader.remaining(), 7);
    }

    proptest! {
        #[test]
        fn total_never_exceeds_limit(
            limit in 0i64..5000,
            chunks in prop::collection::vec(0usize..700, 1..40)
        ) {
            let mut reader = LimitedReader::new(ForeverReader::default(), limit).unwrap();
            let mut total = 0usize;
            for chunk in chunks {
                let mut buf = vec![0u8; chunk];
                total += reader.read(&mut buf).unwrap();
            }
            let mut rest = Vec::new();
            total += reader.read_to_end(&mut rest).unwrap();

            prop_assert_eq!(total as i64, limit);
            prop_assert_eq!(read_byte(&mut reader), None);
        }
    }
}
