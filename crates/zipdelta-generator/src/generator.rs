//! The patch generation pipeline.

use tracing::debug;
use zipdelta_common::{ByteSource, Error, Result};
use zipdelta_deflate::{
    generate_delta_friendly_blob, CompressedRange, DeflateCapability, DeflateParameters,
};
use zipdelta_patch::{DeltaGenerator, EntryDescriptor, PatchContainer, PlanRecord};
use zipdelta_zip::{list_entries_with_options, ZipArchive, ZipEntry};

use crate::config::GeneratorConfig;
use crate::explain::PatchExplanation;
use crate::limiter::apply_limiters;
use crate::matcher::match_entries;
use crate::planner::{PreDiffPlan, PreDiffPlanEntry, PreDiffPlanner};

/// A generated patch with the plan it was built from.
#[derive(Debug, Clone)]
pub struct GeneratedPatch {
    pub container: PatchContainer,
    pub plan: PreDiffPlan,
    pub explanation: PatchExplanation,
}

impl GeneratedPatch {
    /// Serialize the patch container.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        self.container.to_bytes()
    }
}

/// Generates patches between two archives.
///
/// ```no_run
/// # struct MyDiffer;
/// # impl zipdelta_patch::DeltaGenerator for MyDiffer {
/// #     fn generate_delta(&self, _: &[u8], new: &[u8]) -> zipdelta_common::Result<Vec<u8>> {
/// #         Ok(new.to_vec())
/// #     }
/// # }
/// use zipdelta_generator::PatchGenerator;
/// use zipdelta_zip::ZipArchive;
///
/// let old = ZipArchive::open("app-1.apk")?;
/// let new = ZipArchive::open("app-2.apk")?;
/// let patch = PatchGenerator::new(MyDiffer).generate_archives(&old, &new)?;
/// std::fs::write("app.patch", patch.to_bytes()?)?;
/// # Ok::<(), zipdelta_common::Error>(())
/// ```
pub struct PatchGenerator<D> {
    differ: D,
    config: GeneratorConfig,
    capability: DeflateCapability,
}

impl<D: DeltaGenerator> PatchGenerator<D> {
    /// A generator with the default configuration and a detected capability.
    pub fn new(differ: D) -> Self {
        Self {
            differ,
            config: GeneratorConfig::default(),
            capability: DeflateCapability::detect(),
        }
    }

    pub fn with_config(mut self, config: GeneratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_capability(mut self, capability: DeflateCapability) -> Self {
        self.capability = capability;
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate a patch from raw archive bytes.
    pub fn generate<O, N>(&self, old: &O, new: &N) -> Result<GeneratedPatch>
    where
        O: ByteSource + ?Sized,
        N: ByteSource + ?Sized,
    {
        let old_entries = list_entries_with_options(old, &self.config.parse_options)?;
        let new_entries = list_entries_with_options(new, &self.config.parse_options)?;
        self.generate_from_entries(old, &old_entries, new, &new_entries)
    }

    /// Generate a patch between two already opened archives.
    pub fn generate_archives(&self, old: &ZipArchive, new: &ZipArchive) -> Result<GeneratedPatch> {
        self.generate_from_entries(old.source(), old.entries(), new.source(), new.entries())
    }

    fn generate_from_entries<O, N>(
        &self,
        old: &O,
        old_entries: &[ZipEntry],
        new: &N,
        new_entries: &[ZipEntry],
    ) -> Result<GeneratedPatch>
    where
        O: ByteSource + ?Sized,
        N: ByteSource + ?Sized,
    {
        let pairs = match_entries(old_entries, new_entries, self.config.match_strategy);
        let mut plan = PreDiffPlanner::new(old, new, self.capability).plan(&pairs)?;
        plan.entries = apply_limiters(&self.config.limiters(old.len()), plan.entries);

        let mut old_ranges = plan
            .entries
            .iter()
            .filter(|entry| entry.option().uncompresses_old())
            .map(|entry| compressed_range(entry.old_entry()))
            .collect::<Result<Vec<_>>>()?;
        old_ranges.sort_by_key(|range| range.offset);
        old_ranges.dedup_by_key(|range| range.offset);

        let new_ranges = plan
            .entries
            .iter()
            .filter(|entry| entry.option().uncompresses_new())
            .map(|entry| compressed_range(entry.new_entry()))
            .collect::<Result<Vec<_>>>()?;

        let old_blob = generate_delta_friendly_blob(old, &old_ranges)?;
        let new_blob = generate_delta_friendly_blob(new, &new_ranges)?;

        let mut inverse = new_blob.inverse_ranges.iter();
        let records = plan
            .entries
            .iter()
            .map(|entry| {
                let new_delta_friendly_offset = if entry.option().uncompresses_new() {
                    let range = inverse.next().ok_or_else(|| {
                        Error::InvalidArgument("fewer delta-friendly ranges than planned".into())
                    })?;
                    Some(range.start)
                } else {
                    None
                };
                plan_record(entry, new_delta_friendly_offset)
            })
            .collect::<Result<Vec<_>>>()?;

        let delta = self.differ.generate_delta(&old_blob.bytes, &new_blob.bytes)?;
        debug!(
            old_blob = old_blob.bytes.len(),
            new_blob = new_blob.bytes.len(),
            delta = delta.len(),
            records = records.len(),
            "generated patch"
        );

        let container = PatchContainer {
            old_archive_size: old.len(),
            new_archive_size: new.len(),
            records,
            old_blob_size: old_blob.bytes.len() as u64,
            new_blob_size: new_blob.bytes.len() as u64,
            delta,
        };
        let explanation = PatchExplanation::from_plan(&plan);
        Ok(GeneratedPatch {
            container,
            plan,
            explanation,
        })
    }
}

fn compressed_range(entry: &ZipEntry) -> Result<CompressedRange> {
    Ok(CompressedRange {
        offset: entry.data_offset()?,
        compressed_size: entry.compressed_size(),
        uncompressed_size: entry.uncompressed_size(),
        crc32: entry.crc32(),
    })
}

fn descriptor(entry: &ZipEntry, params: Option<DeflateParameters>) -> Result<EntryDescriptor> {
    Ok(EntryDescriptor {
        method: entry.compression_method().as_u16(),
        deflate_level: params.map(|p| p.level() as u8),
        data_offset: entry.data_offset()?,
        compressed_size: entry.compressed_size(),
        uncompressed_size: entry.uncompressed_size(),
        crc32: entry.crc32(),
    })
}

fn plan_record(entry: &PreDiffPlanEntry, new_delta_friendly_offset: Option<u64>) -> Result<PlanRecord> {
    Ok(PlanRecord {
        path: entry.new_entry().path().to_vec(),
        option: entry.option(),
        explanation: entry.explanation(),
        old: descriptor(entry.old_entry(), entry.old_parameters())?,
        new: descriptor(entry.new_entry(), entry.new_parameters())?,
        new_delta_friendly_offset,
    })
}
