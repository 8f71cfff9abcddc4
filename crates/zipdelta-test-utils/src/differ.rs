//! A trivial reference differ.

use std::io::Read;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use zipdelta_common::{Error, Result};
use zipdelta_patch::{DeltaApplier, DeltaGenerator};

/// Encodes `new` as the longest common prefix and suffix of `old` plus the
/// bytes in between.
///
/// The delta is `prefix_len: u64`, `suffix_len: u64` (big-endian) followed by
/// the middle bytes of `new`. It is enough to exercise the patch pipeline
/// without a real binary diff algorithm.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixSuffixDiffer;

impl DeltaGenerator for PrefixSuffixDiffer {
    fn generate_delta(&self, old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
        let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
        let max_suffix = old.len().min(new.len()) - prefix;
        let suffix = old
            .iter()
            .rev()
            .zip(new.iter().rev())
            .take(max_suffix)
            .take_while(|(a, b)| a == b)
            .count();

        let middle = &new[prefix..new.len() - suffix];
        let mut delta = Vec::with_capacity(16 + middle.len());
        delta.write_u64::<BigEndian>(prefix as u64)?;
        delta.write_u64::<BigEndian>(suffix as u64)?;
        delta.extend_from_slice(middle);
        Ok(delta)
    }
}

impl DeltaApplier for PrefixSuffixDiffer {
    fn apply_delta(&self, old: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
        let mut reader = delta;
        let prefix = reader.read_u64::<BigEndian>()? as usize;
        let suffix = reader.read_u64::<BigEndian>()? as usize;
        if prefix.checked_add(suffix).map_or(true, |used| used > old.len()) {
            return Err(Error::Corruption(format!(
                "delta copies {prefix}+{suffix} bytes from a {} byte input",
                old.len()
            )));
        }

        let mut middle = Vec::new();
        reader.read_to_end(&mut middle)?;

        let mut out = Vec::with_capacity(prefix + middle.len() + suffix);
        out.extend_from_slice(&old[..prefix]);
        out.extend_from_slice(&middle);
        out.extend_from_slice(&old[old.len() - suffix..]);
        Ok(out)
    }
}
