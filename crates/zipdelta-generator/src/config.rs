//! Generator configuration.

use zipdelta_zip::ParseOptions;

use crate::limiter::{DeltaFriendlyOldBlobSizeLimiter, PlanLimiter, TotalRecompressionLimiter};

/// How new entries are paired with old ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchStrategy {
    /// Exact path equality only.
    #[default]
    Path,
    /// Path equality, then identical content for entries left unmatched
    /// (renamed or copied files).
    PathThenContent,
}

/// Order in which limiters spend their budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimiterOrder {
    /// Most expensive entries first; ties keep file order.
    #[default]
    LargestFirst,
    /// Plan order.
    FileOrder,
}

/// Options for [`PatchGenerator`](crate::PatchGenerator).
#[derive(Debug, Clone, Default)]
pub struct GeneratorConfig {
    pub parse_options: ParseOptions,
    pub match_strategy: MatchStrategy,
    /// Maximum total uncompressed bytes the applier may have to recompress.
    pub recompression_budget: Option<u64>,
    /// Maximum size of the old delta-friendly blob.
    pub old_blob_budget: Option<u64>,
    pub limiter_order: LimiterOrder,
}

impl GeneratorConfig {
    pub fn with_match_strategy(mut self, strategy: MatchStrategy) -> Self {
        self.match_strategy = strategy;
        self
    }

    pub fn with_recompression_budget(mut self, budget: u64) -> Self {
        self.recompression_budget = Some(budget);
        self
    }

    pub fn with_old_blob_budget(mut self, budget: u64) -> Self {
        self.old_blob_budget = Some(budget);
        self
    }

    pub fn with_limiter_order(mut self, order: LimiterOrder) -> Self {
        self.limiter_order = order;
        self
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.parse_options = options;
        self
    }

    /// The limiters to run, in order, for an old archive of `old_archive_size` bytes.
    pub fn limiters(&self, old_archive_size: u64) -> Vec<Box<dyn PlanLimiter>> {
        let mut limiters: Vec<Box<dyn PlanLimiter>> = Vec::new();
        if let Some(budget) = self.recompression_budget {
            limiters.push(Box::new(
                TotalRecompressionLimiter::new(budget).with_order(self.limiter_order),
            ));
        }
        if let Some(budget) = self.old_blob_budget {
            limiters.push(Box::new(
                DeltaFriendlyOldBlobSizeLimiter::new(old_archive_size, budget).with_order(self.limiter_order),
            ));
        }
        limiters
    }
}
