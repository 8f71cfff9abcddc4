//! CRC-32 hashing utilities.
//!
//! Zip archives record the IEEE CRC-32 of every entry's uncompressed content.

/// Compute the CRC-32 of a byte slice.
#[inline]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// Continue a CRC-32 computation from a previous value.
#[inline]
pub fn crc32_with_seed(data: &[u8], seed: u32) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(seed);
    hasher.update(data);
    hasher.finalize()
}
