//! Resource limits on a pre-diff plan.
//!
//! Limiters run after classification and only ever demote entries to
//! [`ResourceConstrained`](zipdelta_patch::UncompressionExplanation::ResourceConstrained);
//! they never promote.

use tracing::debug;

use crate::config::LimiterOrder;
use crate::planner::PreDiffPlanEntry;

/// A pass over plan entries that demotes what does not fit a budget.
///
/// The output has the same entries in the same order as the input.
pub trait PlanLimiter: Send + Sync {
    fn limit(&self, entries: Vec<PreDiffPlanEntry>) -> Vec<PreDiffPlanEntry>;
}

/// Run limiters in sequence, each on the output of the previous one.
pub fn apply_limiters(
    limiters: &[Box<dyn PlanLimiter>],
    entries: Vec<PreDiffPlanEntry>,
) -> Vec<PreDiffPlanEntry> {
    limiters.iter().fold(entries, |entries, limiter| limiter.limit(entries))
}

/// Bounds the total uncompressed size of new entries the applier has to
/// recompress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TotalRecompressionLimiter {
    budget: u64,
    order: LimiterOrder,
}

impl TotalRecompressionLimiter {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            order: LimiterOrder::default(),
        }
    }

    pub fn with_order(mut self, order: LimiterOrder) -> Self {
        self.order = order;
        self
    }
}

impl PlanLimiter for TotalRecompressionLimiter {
    fn limit(&self, entries: Vec<PreDiffPlanEntry>) -> Vec<PreDiffPlanEntry> {
        limit_greedy(entries, self.order, 0, self.budget, |entry| {
            entry
                .option()
                .uncompresses_new()
                .then(|| entry.new_entry().uncompressed_size())
        })
    }
}

/// Bounds the size of the old delta-friendly blob.
///
/// The blob starts out as large as the old archive and grows by the expansion
/// of every old entry that is uncompressed in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeltaFriendlyOldBlobSizeLimiter {
    old_archive_size: u64,
    budget: u64,
    order: LimiterOrder,
}

impl DeltaFriendlyOldBlobSizeLimiter {
    pub fn new(old_archive_size: u64, budget: u64) -> Self {
        Self {
            old_archive_size,
            budget,
            order: LimiterOrder::default(),
        }
    }

    pub fn with_order(mut self, order: LimiterOrder) -> Self {
        self.order = order;
        self
    }
}

impl PlanLimiter for DeltaFriendlyOldBlobSizeLimiter {
    fn limit(&self, entries: Vec<PreDiffPlanEntry>) -> Vec<PreDiffPlanEntry> {
        limit_greedy(entries, self.order, self.old_archive_size, self.budget, |entry| {
            entry.option().uncompresses_old().then(|| {
                let old = entry.old_entry();
                old.uncompressed_size().saturating_sub(old.compressed_size())
            })
        })
    }
}

/// Keep entries while `initial` plus their costs fits in `budget`.
///
/// `cost` is `None` for entries that hold nothing uncompressed. With
/// [`LimiterOrder::LargestFirst`] smaller entries may still fit after a
/// larger one was demoted. A zero budget demotes every costed entry.
fn limit_greedy<F>(
    entries: Vec<PreDiffPlanEntry>,
    order: LimiterOrder,
    initial: u64,
    budget: u64,
    cost: F,
) -> Vec<PreDiffPlanEntry>
where
    F: Fn(&PreDiffPlanEntry) -> Option<u64>,
{
    let mut costed: Vec<(usize, u64)> = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| cost(entry).map(|cost| (index, cost)))
        .collect();
    if order == LimiterOrder::LargestFirst {
        costed.sort_by(|a, b| b.1.cmp(&a.1));
    }

    let mut total = initial;
    let mut demote = vec![false; entries.len()];
    for (index, cost) in costed {
        match total.checked_add(cost) {
            Some(next) if budget > 0 && next <= budget => total = next,
            _ => demote[index] = true,
        }
    }

    let mut demoted = 0usize;
    let entries: Vec<_> = entries
        .into_iter()
        .zip(demote)
        .map(|(entry, demote)| {
            if demote {
                debug!(
                    path = %entry.new_entry().path_lossy(),
                    was = ?entry.explanation(),
                    "demoted entry over resource budget"
                );
                demoted += 1;
                entry.demoted()
            } else {
                entry
            }
        })
        .collect();

    debug!(budget, total, demoted, "resource limiter pass");
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zipdelta_deflate::DeflateParameters;
    use zipdelta_patch::{UncompressionExplanation as Why, UncompressionOption};
    use zipdelta_zip::{CompressionMethod, ZipEntry};

    fn plan_entry(path: &str, explanation: Why, compressed: u64, uncompressed: u64) -> PreDiffPlanEntry {
        let offset = path.len() as u64 * 1000;
        let entry = |method| {
            ZipEntry::new(path.as_bytes().to_vec(), method, 0, 0, compressed, uncompressed, offset)
                .with_data_offset(offset + 40)
        };
        PreDiffPlanEntry::builder()
            .old_entry(entry(CompressionMethod::Deflate))
            .new_entry(entry(CompressionMethod::Deflate))
            .uncompression(explanation.implied_option(), explanation)
            .new_parameters(DeflateParameters::new(6).ok())
            .build()
            .unwrap()
    }

    fn explanations(entries: &[PreDiffPlanEntry]) -> Vec<Why> {
        entries.iter().map(PreDiffPlanEntry::explanation).collect()
    }

    fn sample() -> Vec<PreDiffPlanEntry> {
        vec![
            plan_entry("a", Why::CompressedBytesChanged, 100, 400),
            plan_entry("bb", Why::UncompressedChangedToCompressed, 50, 200),
            plan_entry("ccc", Why::CompressedBytesIdentical, 10, 1000),
            plan_entry("dddd", Why::CompressedChangedToUncompressed, 100, 300),
            plan_entry("eeeee", Why::CompressedBytesChanged, 20, 100),
        ]
    }

    #[test]
    fn test_recompression_largest_first() {
        let limited = TotalRecompressionLimiter::new(350).limit(sample());
        assert_eq!(
            explanations(&limited),
            vec![
                Why::ResourceConstrained,
                Why::UncompressedChangedToCompressed,
                Why::CompressedBytesIdentical,
                Why::CompressedChangedToUncompressed,
                Why::CompressedBytesChanged,
            ]
        );
        assert_eq!(limited[0].option(), UncompressionOption::UncompressNeither);
    }

    #[test]
    fn test_recompression_file_order() {
        let limited = TotalRecompressionLimiter::new(450)
            .with_order(LimiterOrder::FileOrder)
            .limit(sample());
        assert_eq!(
            explanations(&limited),
            vec![
                Why::CompressedBytesChanged,
                Why::ResourceConstrained,
                Why::CompressedBytesIdentical,
                Why::CompressedChangedToUncompressed,
                Why::ResourceConstrained,
            ]
        );
    }

    #[test]
    fn test_zero_budget_demotes_everything_costed() {
        let limited = TotalRecompressionLimiter::new(0).limit(sample());
        assert_eq!(
            explanations(&limited),
            vec![
                Why::ResourceConstrained,
                Why::ResourceConstrained,
                Why::CompressedBytesIdentical,
                Why::CompressedChangedToUncompressed,
                Why::ResourceConstrained,
            ]
        );
    }

    #[test]
    fn test_old_blob_limit() {
        // Starts at 1000; a: +300, dddd: +200, eeeee: +80.
        let limited = DeltaFriendlyOldBlobSizeLimiter::new(1000, 1290).limit(sample());
        assert_eq!(
            explanations(&limited),
            vec![
                Why::ResourceConstrained,
                Why::UncompressedChangedToCompressed,
                Why::CompressedBytesIdentical,
                Why::CompressedChangedToUncompressed,
                Why::CompressedBytesChanged,
            ]
        );

        let limited = DeltaFriendlyOldBlobSizeLimiter::new(1000, 1300).limit(sample());
        assert_eq!(
            explanations(&limited),
            vec![
                Why::CompressedBytesChanged,
                Why::UncompressedChangedToCompressed,
                Why::CompressedBytesIdentical,
                Why::ResourceConstrained,
                Why::ResourceConstrained,
            ]
        );

        let limited = DeltaFriendlyOldBlobSizeLimiter::new(1000, 999).limit(sample());
        assert_eq!(limited[1].explanation(), Why::UncompressedChangedToCompressed);
        assert!(limited.iter().all(|e| !e.option().uncompresses_old()));
    }

    #[test]
    fn test_chained_limiters() {
        let limiters: Vec<Box<dyn PlanLimiter>> = vec![
            Box::new(TotalRecompressionLimiter::new(10_000)),
            Box::new(DeltaFriendlyOldBlobSizeLimiter::new(1000, 1380)),
        ];
        let limited = apply_limiters(&limiters, sample());
        assert_eq!(
            explanations(&limited),
            vec![
                Why::CompressedBytesChanged,
                Why::UncompressedChangedToCompressed,
                Why::CompressedBytesIdentical,
                Why::ResourceConstrained,
                Why::CompressedBytesChanged,
            ]
        );
    }

    #[test]
    fn test_preserves_order() {
        let input = sample();
        let paths: Vec<_> = input.iter().map(|e| e.new_entry().path().to_vec()).collect();
        let limited = TotalRecompressionLimiter::new(1).limit(input);
        let limited_paths: Vec<_> = limited.iter().map(|e| e.new_entry().path().to_vec()).collect();
        assert_eq!(paths, limited_paths);
    }

    fn arb_explanation() -> impl Strategy<Value = Why> {
        prop_oneof![
            Just(Why::CompressedBytesIdentical),
            Just(Why::CompressedBytesChanged),
            Just(Why::BothEntriesUncompressed),
            Just(Why::CompressedChangedToUncompressed),
            Just(Why::UncompressedChangedToCompressed),
            Just(Why::Unsuitable),
        ]
    }

    proptest! {
        #[test]
        fn prop_limiters_are_idempotent(
            specs in proptest::collection::vec((arb_explanation(), 1u64..500, 0u64..2000), 0..20),
            budget in 0u64..5000,
            file_order in any::<bool>(),
        ) {
            let entries: Vec<_> = specs
                .iter()
                .enumerate()
                .map(|(i, &(why, compressed, extra))| {
                    plan_entry(&"x".repeat(i + 1), why, compressed, compressed + extra)
                })
                .collect();
            let order = if file_order { LimiterOrder::FileOrder } else { LimiterOrder::LargestFirst };

            let limiters: [Box<dyn PlanLimiter>; 2] = [
                Box::new(TotalRecompressionLimiter::new(budget).with_order(order)),
                Box::new(DeltaFriendlyOldBlobSizeLimiter::new(100, budget).with_order(order)),
            ];
            for limiter in &limiters {
                let once = limiter.limit(entries.clone());
                let twice = limiter.limit(once.clone());
                prop_assert_eq!(&once, &twice);

                // Never promotes.
                for (before, after) in entries.iter().zip(&once) {
                    prop_assert!(
                        after.explanation() == before.explanation()
                            || after.explanation() == Why::ResourceConstrained
                    );
                }
            }
        }
    }
}
