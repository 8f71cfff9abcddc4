//! Test utilities for zipdelta.
//!
//! Provides an in-memory zip archive builder, so tests never depend on
//! binary fixtures, and a trivial reference differ that stands in for a real
//! binary diff algorithm.

mod archive;
mod differ;

pub use archive::{deflate_raw, ArchiveBuilder, BuiltArchive, EntryLayout, TestEntry};
pub use differ::PrefixSuffixDiffer;

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
