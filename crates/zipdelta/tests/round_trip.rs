//! End-to-end generate/apply tests.

use zipdelta::deflate::compatibility::corpus;
use zipdelta::prelude::*;
use zipdelta::zip::list_entries;
use zipdelta::Error;
use zipdelta_test_utils::{init_tracing, ArchiveBuilder, BuiltArchive, PrefixSuffixDiffer, TestEntry};

fn text(seed: &str) -> Vec<u8> {
    format!("{seed}: the five boxing wizards jump quickly. ")
        .repeat(30)
        .into_bytes()
}

fn generator() -> PatchGenerator<PrefixSuffixDiffer> {
    PatchGenerator::new(PrefixSuffixDiffer).with_capability(DeflateCapability::assume(true))
}

fn applier() -> PatchApplier {
    PatchApplier::with_capability(DeflateCapability::assume(true))
}

/// Generate a patch, apply it, and check the result is the new archive.
fn round_trip(
    generator: &PatchGenerator<PrefixSuffixDiffer>,
    old: &BuiltArchive,
    new: &BuiltArchive,
) -> zipdelta::generator::GeneratedPatch {
    let patch = generator.generate(old.bytes.as_slice(), new.bytes.as_slice()).unwrap();
    let bytes = patch.to_bytes().unwrap();
    let rebuilt = applier().apply(old.bytes.as_slice(), &bytes, &PrefixSuffixDiffer).unwrap();
    assert!(rebuilt == new.bytes, "rebuilt archive differs from the new archive");
    patch
}

fn explanation_of(patch: &zipdelta::generator::GeneratedPatch, path: &str) -> UncompressionExplanation {
    patch
        .container
        .records
        .iter()
        .find(|r| r.path == path.as_bytes())
        .unwrap_or_else(|| panic!("no record for {path}"))
        .explanation
}

fn every_classification() -> (BuiltArchive, BuiltArchive) {
    let old = ArchiveBuilder::new()
        .entry(TestEntry::stored("stored/same", b"identical stored entry"))
        .entry(TestEntry::stored("stored/changed", &text("stored before")))
        .entry(TestEntry::deflated("deflate/same", &text("same"), 6))
        .entry(TestEntry::deflated("deflate/changed", &text("deflate before"), 6))
        .entry(TestEntry::stored("became/deflate", &text("became deflate")))
        .entry(TestEntry::deflated("became/stored", &text("became stored"), 9))
        .entry(TestEntry::with_payload("other/method", 12, b"opaque".to_vec(), 0, 6))
        .entry(TestEntry::deflated("removed", &text("removed"), 6))
        .build();
    let new = ArchiveBuilder::new()
        .entry(TestEntry::deflated("added", &text("added"), 6))
        .entry(TestEntry::stored("stored/same", b"identical stored entry"))
        .entry(TestEntry::stored("stored/changed", &text("stored after")))
        .entry(TestEntry::deflated("deflate/same", &text("same"), 6))
        .entry(TestEntry::deflated("deflate/changed", &text("deflate after"), 6))
        .entry(TestEntry::deflated("became/deflate", &text("became deflate, edited"), 2))
        .entry(TestEntry::stored("became/stored", &text("became stored, edited")))
        .entry(TestEntry::with_payload("other/method", 12, b"opaque2".to_vec(), 1, 7))
        .build();
    (old, new)
}

#[test]
fn test_every_classification_round_trips() {
    init_tracing();
    let (old, new) = every_classification();
    let patch = round_trip(&generator(), &old, &new);

    use UncompressionExplanation as Why;
    assert_eq!(explanation_of(&patch, "stored/same"), Why::CompressedBytesIdentical);
    assert_eq!(explanation_of(&patch, "stored/changed"), Why::BothEntriesUncompressed);
    assert_eq!(explanation_of(&patch, "deflate/same"), Why::CompressedBytesIdentical);
    assert_eq!(explanation_of(&patch, "deflate/changed"), Why::CompressedBytesChanged);
    assert_eq!(explanation_of(&patch, "became/deflate"), Why::UncompressedChangedToCompressed);
    assert_eq!(explanation_of(&patch, "became/stored"), Why::CompressedChangedToUncompressed);
    assert_eq!(explanation_of(&patch, "other/method"), Why::Unsuitable);

    // New entries are explained, not planned; removed ones vanish.
    assert_eq!(patch.container.records.len(), 7);
    assert!(patch.container.records.iter().all(|r| r.path != b"added" && r.path != b"removed"));
}

#[test]
fn test_same_content_recompressed() {
    let content = corpus();
    let old = ArchiveBuilder::new().entry(TestEntry::deflated("/a", &content, 1)).build();
    let new = ArchiveBuilder::new().entry(TestEntry::deflated("/a", &content, 9)).build();
    assert_ne!(old.payload(b"/a"), new.payload(b"/a"));

    let patch = round_trip(&generator(), &old, &new);
    let record = &patch.container.records[0];
    assert_eq!(record.option, UncompressionOption::UncompressBoth);
    assert_eq!(record.explanation, UncompressionExplanation::CompressedBytesChanged);
    assert_eq!(record.new.deflate_level, Some(9));

    // Same uncompressed content: the entry costs nothing in the patch.
    assert_eq!(patch.explanation.explained_as_unchanged_or_free().len(), 1);
    assert_eq!(patch.explanation.changed_size(), 0);

    let rebuilt = applier()
        .apply(old.bytes.as_slice(), &patch.to_bytes().unwrap(), &PrefixSuffixDiffer)
        .unwrap();
    let entries = list_entries(rebuilt.as_slice()).unwrap();
    assert_eq!(
        entries[0].read_compressed(rebuilt.as_slice()).unwrap(),
        new.payload(b"/a").unwrap()
    );
}

#[test]
fn test_new_entry_counts_towards_new_size() {
    let old = ArchiveBuilder::new().entry(TestEntry::stored("kept", b"kept")).build();
    let new = ArchiveBuilder::new()
        .entry(TestEntry::stored("kept", b"kept"))
        .entry(TestEntry::deflated("fresh", &text("fresh"), 6))
        .build();

    let patch = round_trip(&generator(), &old, &new);
    assert_eq!(patch.container.records.len(), 1);

    let fresh = new.entries.iter().find(|e| e.path == b"fresh").unwrap();
    let explained = patch.explanation.explained_as_new();
    assert_eq!(explained.len(), 1);
    assert_eq!(explained[0].path, b"fresh");
    assert_eq!(patch.explanation.new_size(), fresh.compressed_size);
}

#[test]
fn test_structural_variations() {
    let old = ArchiveBuilder::new()
        .entry(TestEntry::deflated("described", &text("described old"), 6).with_data_descriptor())
        .entry(TestEntry::deflated("extra", &text("extra old"), 6).with_local_extra(vec![0xCA, 0xFE, 2, 0, 1, 2]))
        .comment(b"old comment")
        .reverse_central_directory()
        .build();
    let new = ArchiveBuilder::new()
        .entry(TestEntry::deflated("described", &text("described new"), 6).with_data_descriptor())
        .entry(TestEntry::deflated("extra", &text("extra new"), 9).with_central_extra(vec![0xCA, 0xFE, 0, 0]))
        .comment(b"a different, longer comment")
        .build();

    let patch = round_trip(&generator(), &old, &new);
    assert!(patch
        .container
        .records
        .iter()
        .all(|r| r.explanation == UncompressionExplanation::CompressedBytesChanged));
}

#[test]
fn test_zip64_round_trip() {
    let old = ArchiveBuilder::new()
        .entry(TestEntry::deflated("big", &text("zip64 old"), 6))
        .zip64()
        .build();
    let new = ArchiveBuilder::new()
        .entry(TestEntry::deflated("big", &text("zip64 new"), 6))
        .zip64()
        .build();
    round_trip(&generator(), &old, &new);
}

#[test]
fn test_incompatible_codec_still_round_trips() {
    let (old, new) = every_classification();
    let generator = PatchGenerator::new(PrefixSuffixDiffer).with_capability(DeflateCapability::assume(false));
    let patch = generator.generate(old.bytes.as_slice(), new.bytes.as_slice()).unwrap();

    use UncompressionExplanation as Why;
    assert_eq!(explanation_of(&patch, "deflate/changed"), Why::DeflateUnsuitable);
    assert_eq!(explanation_of(&patch, "became/deflate"), Why::DeflateUnsuitable);
    assert_eq!(explanation_of(&patch, "became/stored"), Why::CompressedChangedToUncompressed);

    // Nothing needs recompressing, so an incompatible applier succeeds too.
    let rebuilt = PatchApplier::with_capability(DeflateCapability::assume(false))
        .apply(old.bytes.as_slice(), &patch.to_bytes().unwrap(), &PrefixSuffixDiffer)
        .unwrap();
    assert_eq!(rebuilt, new.bytes);
}

#[test]
fn test_budgets() {
    let (old, new) = every_classification();

    let no_recompression = generator().with_config(GeneratorConfig::default().with_recompression_budget(0));
    let patch = round_trip(&no_recompression, &old, &new);
    use UncompressionExplanation as Why;
    assert_eq!(explanation_of(&patch, "deflate/changed"), Why::ResourceConstrained);
    assert_eq!(explanation_of(&patch, "became/deflate"), Why::ResourceConstrained);
    assert_eq!(explanation_of(&patch, "became/stored"), Why::CompressedChangedToUncompressed);

    let no_old_growth = generator().with_config(
        GeneratorConfig::default()
            .with_old_blob_budget(old.bytes.len() as u64)
            .with_limiter_order(LimiterOrder::FileOrder),
    );
    let patch = round_trip(&no_old_growth, &old, &new);
    assert_eq!(explanation_of(&patch, "deflate/changed"), Why::ResourceConstrained);
    assert_eq!(explanation_of(&patch, "became/stored"), Why::ResourceConstrained);
    assert_eq!(explanation_of(&patch, "became/deflate"), Why::UncompressedChangedToCompressed);
    assert_eq!(patch.container.old_blob_size, old.bytes.len() as u64);
}

#[test]
fn test_renamed_entry_matched_by_content() {
    let content = corpus();
    let old = ArchiveBuilder::new()
        .entry(TestEntry::deflated("assets/old-name.bin", &content, 6))
        .build();
    let new = ArchiveBuilder::new()
        .entry(TestEntry::deflated("assets/new-name.bin", &content, 6))
        .build();

    let by_path = round_trip(&generator(), &old, &new);
    assert!(by_path.container.records.is_empty());

    let by_content = round_trip(
        &generator().with_config(GeneratorConfig::default().with_match_strategy(MatchStrategy::PathThenContent)),
        &old,
        &new,
    );
    assert_eq!(explanation_of(&by_content, "assets/new-name.bin"), UncompressionExplanation::CompressedBytesIdentical);
}

#[test]
fn test_detects_wrong_input() {
    let (old, new) = every_classification();
    let patch = generator()
        .generate(old.bytes.as_slice(), new.bytes.as_slice())
        .unwrap()
        .to_bytes()
        .unwrap();

    // A different archive of the same length.
    let mut other = old.bytes.clone();
    let layout = old.entries.iter().find(|e| e.path == b"deflate/changed").unwrap();
    other[layout.data_offset as usize] ^= 0xFF;
    assert!(matches!(
        applier().apply(other.as_slice(), &patch, &PrefixSuffixDiffer),
        Err(Error::Corruption(_))
    ));

    // The new archive instead of the old one.
    assert!(applier().apply(new.bytes.as_slice(), &patch, &PrefixSuffixDiffer).is_err());
}

#[test]
fn test_files_on_disk() {
    let (old, new) = every_classification();
    let dir = tempfile::tempdir().unwrap();
    let old_path = dir.path().join("old.zip");
    let new_path = dir.path().join("new.zip");
    std::fs::write(&old_path, &old.bytes).unwrap();
    std::fs::write(&new_path, &new.bytes).unwrap();

    let old_archive = ZipArchive::open(&old_path).unwrap();
    let new_archive = ZipArchive::open(&new_path).unwrap();
    let patch = generator()
        .generate_archives(&old_archive, &new_archive)
        .unwrap()
        .to_bytes()
        .unwrap();

    let old_file = FileSource::open(&old_path).unwrap();
    let rebuilt = applier().apply(&old_file, &patch, &PrefixSuffixDiffer).unwrap();
    assert_eq!(rebuilt, new.bytes);
}
