//! The seam to an external binary differ.
//!
//! zipdelta does not diff bytes itself. Delta-friendly blobs are handed to a
//! [`DeltaGenerator`] on the generating side and the resulting delta to a
//! [`DeltaApplier`] on the applying side. Any algorithm works as long as the
//! two agree.

use zipdelta_common::Result;

/// Produces a delta that turns `old` into `new`.
pub trait DeltaGenerator {
    fn generate_delta(&self, old: &[u8], new: &[u8]) -> Result<Vec<u8>>;
}

/// Reconstructs `new` from `old` and a delta made by the matching [`DeltaGenerator`].
pub trait DeltaApplier {
    fn apply_delta(&self, old: &[u8], delta: &[u8]) -> Result<Vec<u8>>;
}

impl<T: DeltaGenerator + ?Sized> DeltaGenerator for &T {
    fn generate_delta(&self, old: &[u8], new: &[u8]) -> Result<Vec<u8>> {
        (**self).generate_delta(old, new)
    }
}

impl<T: DeltaApplier + ?Sized> DeltaApplier for &T {
    fn apply_delta(&self, old: &[u8], delta: &[u8]) -> Result<Vec<u8>> {
        (**self).apply_delta(old, delta)
    }
}
