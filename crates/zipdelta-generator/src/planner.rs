//! Pre-diff planning: deciding which entries to uncompress before diffing.
//!
//! Classification is pairwise and content based. Whether the result can be
//! afforded is decided afterwards by the limiters.

use tracing::{debug, trace, warn};
use zipdelta_common::{ByteSource, Error, Result};
use zipdelta_deflate::{divine_entry, DeflateCapability, DeflateParameters};
use zipdelta_patch::{UncompressionExplanation, UncompressionOption};
use zipdelta_zip::{CompressionMethod, ZipEntry};

use crate::matcher::MatchedEntryPair;

/// The plan for one matched entry pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreDiffPlanEntry {
    old: ZipEntry,
    new: ZipEntry,
    explanation: UncompressionExplanation,
    old_parameters: Option<DeflateParameters>,
    new_parameters: Option<DeflateParameters>,
}

impl PreDiffPlanEntry {
    pub fn builder() -> PreDiffPlanEntryBuilder {
        PreDiffPlanEntryBuilder::default()
    }

    pub fn old_entry(&self) -> &ZipEntry {
        &self.old
    }

    pub fn new_entry(&self) -> &ZipEntry {
        &self.new
    }

    #[inline]
    pub fn option(&self) -> UncompressionOption {
        self.explanation.implied_option()
    }

    #[inline]
    pub fn explanation(&self) -> UncompressionExplanation {
        self.explanation
    }

    /// Parameters that reproduce the old payload, when they were recovered.
    pub fn old_parameters(&self) -> Option<DeflateParameters> {
        self.old_parameters
    }

    /// Parameters the applier recompresses the new payload with.
    pub fn new_parameters(&self) -> Option<DeflateParameters> {
        self.new_parameters
    }

    /// The same entry, no longer uncompressed on either side.
    pub fn demoted(self) -> Self {
        Self {
            explanation: UncompressionExplanation::ResourceConstrained,
            ..self
        }
    }
}

/// Builder for [`PreDiffPlanEntry`].
///
/// Exactly one option and explanation pair is set per entry, and the pair
/// must agree.
#[derive(Debug, Default)]
pub struct PreDiffPlanEntryBuilder {
    old: Option<ZipEntry>,
    new: Option<ZipEntry>,
    uncompression: Option<(UncompressionOption, UncompressionExplanation)>,
    old_parameters: Option<DeflateParameters>,
    new_parameters: Option<DeflateParameters>,
}

impl PreDiffPlanEntryBuilder {
    pub fn old_entry(mut self, entry: ZipEntry) -> Self {
        self.old = Some(entry);
        self
    }

    pub fn new_entry(mut self, entry: ZipEntry) -> Self {
        self.new = Some(entry);
        self
    }

    pub fn uncompression(mut self, option: UncompressionOption, explanation: UncompressionExplanation) -> Self {
        self.uncompression = Some((option, explanation));
        self
    }

    pub fn old_parameters(mut self, params: Option<DeflateParameters>) -> Self {
        self.old_parameters = params;
        self
    }

    pub fn new_parameters(mut self, params: Option<DeflateParameters>) -> Self {
        self.new_parameters = params;
        self
    }

    pub fn build(self) -> Result<PreDiffPlanEntry> {
        let old = self
            .old
            .ok_or_else(|| Error::InvalidArgument("plan entry without an old entry".into()))?;
        let new = self
            .new
            .ok_or_else(|| Error::InvalidArgument("plan entry without a new entry".into()))?;
        let (option, explanation) = self.uncompression.ok_or_else(|| {
            Error::InvalidArgument(format!("no uncompression option for {}", new.path_lossy()))
        })?;

        if explanation == UncompressionExplanation::New || explanation.implied_option() != option {
            return Err(Error::InvalidArgument(format!(
                "{}: option {option:?} cannot be explained by {explanation:?}",
                new.path_lossy()
            )));
        }
        if option.uncompresses_new() && self.new_parameters.is_none() {
            return Err(Error::InvalidArgument(format!(
                "{}: uncompressing the new entry requires its deflate parameters",
                new.path_lossy()
            )));
        }

        Ok(PreDiffPlanEntry {
            old,
            new,
            explanation,
            old_parameters: self.old_parameters,
            new_parameters: self.new_parameters,
        })
    }
}

/// The result of planning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreDiffPlan {
    /// One entry per matched pair, sorted by new local header offset.
    pub entries: Vec<PreDiffPlanEntry>,
    /// New entries without an old counterpart, in new file order.
    pub new_entries: Vec<ZipEntry>,
}

enum Divination {
    Found(DeflateParameters),
    NotFound,
    Failed,
}

struct Classification {
    explanation: UncompressionExplanation,
    old_parameters: Option<DeflateParameters>,
    new_parameters: Option<DeflateParameters>,
}

impl From<UncompressionExplanation> for Classification {
    fn from(explanation: UncompressionExplanation) -> Self {
        Self {
            explanation,
            old_parameters: None,
            new_parameters: None,
        }
    }
}

/// Classifies matched entry pairs.
pub struct PreDiffPlanner<'a, O: ?Sized, N: ?Sized> {
    old_source: &'a O,
    new_source: &'a N,
    capability: DeflateCapability,
}

impl<'a, O, N> PreDiffPlanner<'a, O, N>
where
    O: ByteSource + ?Sized,
    N: ByteSource + ?Sized,
{
    pub fn new(old_source: &'a O, new_source: &'a N, capability: DeflateCapability) -> Self {
        Self {
            old_source,
            new_source,
            capability,
        }
    }

    /// Plan every pair.
    ///
    /// A codec failure on one entry becomes that entry's explanation and
    /// never stops planning of the others. Failing to read either source does.
    pub fn plan(&self, pairs: &[MatchedEntryPair<'_>]) -> Result<PreDiffPlan> {
        let new_entries: Vec<ZipEntry> = pairs
            .iter()
            .filter(|pair| pair.is_new())
            .map(|pair| pair.new.clone())
            .collect();
        let matched: Vec<(&ZipEntry, &ZipEntry)> = pairs
            .iter()
            .filter_map(|pair| pair.old.map(|old| (old, pair.new)))
            .collect();

        #[cfg(feature = "parallel")]
        let classified: Vec<PreDiffPlanEntry> = {
            use rayon::prelude::*;
            matched
                .par_iter()
                .map(|&(old, new)| self.plan_entry(old, new))
                .collect::<Result<_>>()?
        };
        #[cfg(not(feature = "parallel"))]
        let classified: Vec<PreDiffPlanEntry> = matched
            .iter()
            .map(|&(old, new)| self.plan_entry(old, new))
            .collect::<Result<_>>()?;

        let mut entries = classified;
        entries.sort_by_key(|entry| entry.new.local_header_offset());

        debug!(
            planned = entries.len(),
            new = new_entries.len(),
            uncompressed = entries
                .iter()
                .filter(|e| e.option() != UncompressionOption::UncompressNeither)
                .count(),
            "pre-diff plan complete"
        );
        Ok(PreDiffPlan { entries, new_entries })
    }

    fn plan_entry(&self, old: &ZipEntry, new: &ZipEntry) -> Result<PreDiffPlanEntry> {
        let classification = self.classify(old, new)?;
        trace!(
            path = %new.path_lossy(),
            explanation = ?classification.explanation,
            "classified entry"
        );
        PreDiffPlanEntry::builder()
            .old_entry(old.clone())
            .new_entry(new.clone())
            .uncompression(
                classification.explanation.implied_option(),
                classification.explanation,
            )
            .old_parameters(classification.old_parameters)
            .new_parameters(classification.new_parameters)
            .build()
    }

    fn classify(&self, old: &ZipEntry, new: &ZipEntry) -> Result<Classification> {
        use CompressionMethod::{Deflate, Stored};
        use UncompressionExplanation as Why;

        match (old.compression_method(), new.compression_method()) {
            (Stored, Stored) => {
                let explanation = if self.same_compressed_bytes(old, new)? {
                    Why::CompressedBytesIdentical
                } else {
                    Why::BothEntriesUncompressed
                };
                Ok(explanation.into())
            }

            (Deflate, Deflate) => {
                if self.same_compressed_bytes(old, new)? {
                    return Ok(Why::CompressedBytesIdentical.into());
                }
                if !self.capability.is_compatible() {
                    return Ok(Why::DeflateUnsuitable.into());
                }
                let new_parameters = match divine(new, self.new_source)? {
                    Divination::Found(params) => params,
                    Divination::NotFound => return Ok(Why::DeflateUnsuitable.into()),
                    Divination::Failed => return Ok(Why::Unsuitable.into()),
                };
                let old_parameters = match divine(old, self.old_source)? {
                    Divination::Found(params) => Some(params),
                    Divination::NotFound => None,
                    Divination::Failed => return Ok(Why::Unsuitable.into()),
                };
                Ok(Classification {
                    explanation: Why::CompressedBytesChanged,
                    old_parameters,
                    new_parameters: Some(new_parameters),
                })
            }

            (Stored, Deflate) => {
                if !self.capability.is_compatible() {
                    return Ok(Why::DeflateUnsuitable.into());
                }
                match divine(new, self.new_source)? {
                    Divination::Found(params) => Ok(Classification {
                        explanation: Why::UncompressedChangedToCompressed,
                        old_parameters: None,
                        new_parameters: Some(params),
                    }),
                    Divination::NotFound => Ok(Why::DeflateUnsuitable.into()),
                    Divination::Failed => Ok(Why::Unsuitable.into()),
                }
            }

            (Deflate, Stored) => match divine(old, self.old_source)? {
                Divination::Failed => Ok(Why::Unsuitable.into()),
                found => Ok(Classification {
                    explanation: Why::CompressedChangedToUncompressed,
                    old_parameters: match found {
                        Divination::Found(params) => Some(params),
                        _ => None,
                    },
                    new_parameters: None,
                }),
            },

            _ => Ok(Why::Unsuitable.into()),
        }
    }

    fn same_compressed_bytes(&self, old: &ZipEntry, new: &ZipEntry) -> Result<bool> {
        if old.compressed_size() != new.compressed_size() {
            return Ok(false);
        }
        Ok(old.read_compressed(self.old_source)? == new.read_compressed(self.new_source)?)
    }
}

fn divine<S: ByteSource + ?Sized>(entry: &ZipEntry, source: &S) -> Result<Divination> {
    match divine_entry(entry, source) {
        Ok(Some(params)) => Ok(Divination::Found(params)),
        Ok(None) => Ok(Divination::NotFound),
        Err(e @ (Error::Corruption(_) | Error::UnsupportedCodec(_))) => {
            warn!(path = %entry.path_lossy(), error = %e, "cannot uncompress entry");
            Ok(Divination::Failed)
        }
        Err(e) => Err(e),
    }
}
