//! Plan model and patch container format for zipdelta.
//!
//! A patch is a [`PatchContainer`]: one [`PlanRecord`] per matched entry pair
//! describing how it was transformed, followed by the delta an external
//! differ produced between the old and new delta-friendly blobs.

mod container;
mod differ;
mod option;
mod record;

pub use container::{PatchContainer, MAGIC};
pub use differ::{DeltaApplier, DeltaGenerator};
pub use option::{UncompressionExplanation, UncompressionOption};
pub use record::{EntryDescriptor, PlanRecord};
pub use zipdelta_common::{Error, Result};
