//! Zipdelta - small binary patches between zip archives.
//!
//! Archives that hold mostly the same content still diff badly, because
//! recompression scrambles the bytes. Zipdelta uncompresses matched entries
//! before handing both archives to a binary differ, and recompresses them
//! bit-exactly when the patch is applied.
//!
//! # Crates
//!
//! - [`zipdelta_common`] - errors, positioned byte sources, bounded readers
//! - [`zipdelta_zip`] - structural zip parsing
//! - [`zipdelta_deflate`] - bit-exact deflate, compatibility check, delta-friendly blobs
//! - [`zipdelta_patch`] - plan records and the patch container
//! - [`zipdelta_generator`] - matching, planning, resource limits, patch generation
//! - [`zipdelta_applier`] - patch application and recompression
//!
//! The binary differ itself is supplied by the caller through the
//! [`DeltaGenerator`](zipdelta_patch::DeltaGenerator) and
//! [`DeltaApplier`](zipdelta_patch::DeltaApplier) traits.
//!
//! # Example
//!
//! ```no_run
//! use zipdelta::prelude::*;
//! # struct Passthrough;
//! # impl DeltaGenerator for Passthrough {
//! #     fn generate_delta(&self, _: &[u8], new: &[u8]) -> zipdelta::Result<Vec<u8>> { Ok(new.to_vec()) }
//! # }
//! # impl DeltaApplier for Passthrough {
//! #     fn apply_delta(&self, _: &[u8], delta: &[u8]) -> zipdelta::Result<Vec<u8>> { Ok(delta.to_vec()) }
//! # }
//!
//! let old = ZipArchive::open("app-1.apk")?;
//! let new = ZipArchive::open("app-2.apk")?;
//!
//! let config = GeneratorConfig::default().with_recompression_budget(64 << 20);
//! let patch = PatchGenerator::new(Passthrough).with_config(config).generate_archives(&old, &new)?;
//! let bytes = patch.to_bytes()?;
//!
//! let rebuilt = PatchApplier::new().apply(old.source(), &bytes, &Passthrough)?;
//! assert_eq!(rebuilt.len() as u64, new.len());
//! # Ok::<(), zipdelta::Error>(())
//! ```

pub use zipdelta_applier as applier;
pub use zipdelta_common as common;
pub use zipdelta_deflate as deflate;
pub use zipdelta_generator as generator;
pub use zipdelta_patch as patch;
pub use zipdelta_zip as zip;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use zipdelta_applier::PatchApplier;
    pub use zipdelta_common::{ByteSource, FileSource};
    pub use zipdelta_deflate::DeflateCapability;
    pub use zipdelta_generator::{GeneratorConfig, LimiterOrder, MatchStrategy, PatchExplanation, PatchGenerator};
    pub use zipdelta_patch::{
        DeltaApplier, DeltaGenerator, PatchContainer, UncompressionExplanation, UncompressionOption,
    };
    pub use zipdelta_zip::{ZipArchive, ZipEntry};
}

pub use zipdelta_common::{Error, Result};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
