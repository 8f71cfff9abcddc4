//! Summaries of what a patch contains.

use zipdelta_patch::UncompressionExplanation;
use zipdelta_zip::ZipEntry;

use crate::planner::{PreDiffPlan, PreDiffPlanEntry};

/// Why one entry of the new archive costs what it costs.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EntryExplanation {
    pub path: Vec<u8>,
    /// `None` for entries that are new.
    pub explanation: Option<UncompressionExplanation>,
    /// Estimated bytes this entry adds to the patch.
    pub compressed_size_in_patch: u64,
}

impl EntryExplanation {
    pub fn for_new(entry: &ZipEntry) -> Self {
        Self {
            path: entry.path().to_vec(),
            explanation: None,
            compressed_size_in_patch: entry.compressed_size(),
        }
    }

    /// Explain a planned entry.
    ///
    /// Identical compressed bytes are free. So is content whose CRC-32 and
    /// size did not change, since the differ sees it unchanged once both
    /// sides are uncompressed. Anything else is estimated at its new
    /// compressed size.
    pub fn for_planned(entry: &PreDiffPlanEntry) -> Self {
        let (old, new) = (entry.old_entry(), entry.new_entry());
        let free = match entry.explanation() {
            UncompressionExplanation::CompressedBytesIdentical => true,
            UncompressionExplanation::CompressedBytesChanged => {
                old.crc32() == new.crc32() && old.uncompressed_size() == new.uncompressed_size()
            }
            _ => false,
        };
        Self {
            path: new.path().to_vec(),
            explanation: Some(entry.explanation()),
            compressed_size_in_patch: if free { 0 } else { new.compressed_size() },
        }
    }

    #[inline]
    pub fn is_new(&self) -> bool {
        self.explanation.is_none()
    }
}

/// Entry explanations bucketed into new, changed and unchanged-or-free,
/// each sorted by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PatchExplanation {
    new: Vec<EntryExplanation>,
    changed: Vec<EntryExplanation>,
    unchanged_or_free: Vec<EntryExplanation>,
}

impl PatchExplanation {
    pub fn new(explanations: impl IntoIterator<Item = EntryExplanation>) -> Self {
        let mut result = Self::default();
        for explanation in explanations {
            if explanation.is_new() {
                result.new.push(explanation);
            } else if explanation.compressed_size_in_patch > 0 {
                result.changed.push(explanation);
            } else {
                result.unchanged_or_free.push(explanation);
            }
        }
        for bucket in [&mut result.new, &mut result.changed, &mut result.unchanged_or_free] {
            bucket.sort_by(|a, b| a.path.cmp(&b.path));
        }
        result
    }

    pub fn from_plan(plan: &PreDiffPlan) -> Self {
        Self::new(
            plan.new_entries
                .iter()
                .map(EntryExplanation::for_new)
                .chain(plan.entries.iter().map(EntryExplanation::for_planned)),
        )
    }

    pub fn explained_as_new(&self) -> &[EntryExplanation] {
        &self.new
    }

    pub fn explained_as_changed(&self) -> &[EntryExplanation] {
        &self.changed
    }

    pub fn explained_as_unchanged_or_free(&self) -> &[EntryExplanation] {
        &self.unchanged_or_free
    }

    /// Total estimated size of new entries.
    pub fn new_size(&self) -> u64 {
        self.new.iter().map(|e| e.compressed_size_in_patch).sum()
    }

    /// Total estimated size of changed entries.
    pub fn changed_size(&self) -> u64 {
        self.changed.iter().map(|e| e.compressed_size_in_patch).sum()
    }
}
