//! Patch generation for zipdelta.
//!
//! Generation runs in stages:
//!
//! 1. both archives are listed by the structural parser
//! 2. [`match_entries`] pairs new entries with old ones
//! 3. [`PreDiffPlanner`] decides, per pair, what to uncompress before diffing
//! 4. [`PlanLimiter`]s demote what does not fit the configured budgets
//! 5. the delta-friendly blobs are built and handed to the external differ
//!
//! [`PatchGenerator`] runs all of them and returns a
//! [`PatchContainer`](zipdelta_patch::PatchContainer).

mod config;
mod explain;
mod generator;
mod limiter;
mod matcher;
mod planner;

pub use config::{GeneratorConfig, LimiterOrder, MatchStrategy};
pub use explain::{EntryExplanation, PatchExplanation};
pub use generator::{GeneratedPatch, PatchGenerator};
pub use limiter::{apply_limiters, DeltaFriendlyOldBlobSizeLimiter, PlanLimiter, TotalRecompressionLimiter};
pub use matcher::{match_entries, MatchedEntryPair};
pub use planner::{PreDiffPlan, PreDiffPlanEntry, PreDiffPlanEntryBuilder, PreDiffPlanner};
pub use zipdelta_common::{Error, Result};
