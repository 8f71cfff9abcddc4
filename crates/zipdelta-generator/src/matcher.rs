//! Pairing of old and new archive entries.

use std::collections::{HashMap, HashSet};

use tracing::debug;
use zipdelta_zip::{CompressionMethod, ZipEntry};

use crate::config::MatchStrategy;

/// An entry of the new archive and its counterpart in the old one, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedEntryPair<'a> {
    pub old: Option<&'a ZipEntry>,
    pub new: &'a ZipEntry,
}

impl MatchedEntryPair<'_> {
    /// Whether the new entry has no old counterpart.
    #[inline]
    pub fn is_new(&self) -> bool {
        self.old.is_none()
    }
}

type ContentKey = (CompressionMethod, u32, u64, u64);

fn content_key(entry: &ZipEntry) -> ContentKey {
    (
        entry.compression_method(),
        entry.crc32(),
        entry.compressed_size(),
        entry.uncompressed_size(),
    )
}

/// Pair every new entry with an old entry.
///
/// Paths are compared as raw bytes. When an archive repeats a path, its first
/// occurrence wins: later old duplicates are never matched and later new
/// duplicates are treated as new. Old entries without a counterpart are
/// dropped. The output follows the order of `new`.
pub fn match_entries<'a>(
    old: &'a [ZipEntry],
    new: &'a [ZipEntry],
    strategy: MatchStrategy,
) -> Vec<MatchedEntryPair<'a>> {
    let mut old_by_path: HashMap<&[u8], &ZipEntry> = HashMap::with_capacity(old.len());
    for entry in old {
        old_by_path.entry(entry.path()).or_insert(entry);
    }

    let mut old_by_content: HashMap<ContentKey, &ZipEntry> = HashMap::new();
    if strategy == MatchStrategy::PathThenContent {
        for entry in old {
            old_by_content.entry(content_key(entry)).or_insert(entry);
        }
    }

    let mut seen = HashSet::with_capacity(new.len());
    let pairs: Vec<_> = new
        .iter()
        .map(|entry| {
            let old = if seen.insert(entry.path()) {
                old_by_path
                    .get(entry.path())
                    .or_else(|| old_by_content.get(&content_key(entry)))
                    .copied()
            } else {
                None
            };
            MatchedEntryPair { old, new: entry }
        })
        .collect();

    debug!(
        old_entries = old.len(),
        new_entries = new.len(),
        matched = pairs.iter().filter(|p| !p.is_new()).count(),
        "matched entries"
    );
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, crc32: u32, offset: u64) -> ZipEntry {
        ZipEntry::new(path.as_bytes().to_vec(), CompressionMethod::Deflate, 0, crc32, 10, 40, offset)
            .with_data_offset(offset + 30 + path.len() as u64)
    }

    fn paths(pairs: &[MatchedEntryPair<'_>]) -> Vec<(Option<String>, String)> {
        pairs
            .iter()
            .map(|p| {
                (
                    p.old.map(|o| o.path_lossy().into_owned()),
                    p.new.path_lossy().into_owned(),
                )
            })
            .collect()
    }

    #[test]
    fn test_match_by_path() {
        let old = vec![entry("a", 1, 0), entry("b", 2, 100), entry("gone", 3, 200)];
        let new = vec![entry("b", 2, 0), entry("fresh", 4, 100), entry("a", 5, 200)];

        let pairs = match_entries(&old, &new, MatchStrategy::Path);
        assert_eq!(
            paths(&pairs),
            vec![
                (Some("b".into()), "b".into()),
                (None, "fresh".into()),
                (Some("a".into()), "a".into()),
            ]
        );
        assert!(std::ptr::eq(pairs[0].old.unwrap(), &old[1]));
    }

    #[test]
    fn test_paths_are_bytes() {
        let old = vec![ZipEntry::new(vec![0xFF, b'x'], CompressionMethod::Stored, 0, 0, 1, 1, 0)];
        let new = vec![
            ZipEntry::new(vec![0xFF, b'x'], CompressionMethod::Stored, 0, 0, 1, 1, 0),
            ZipEntry::new(vec![0xFE, b'x'], CompressionMethod::Stored, 0, 0, 1, 1, 50),
        ];
        let pairs = match_entries(&old, &new, MatchStrategy::Path);
        assert!(!pairs[0].is_new());
        assert!(pairs[1].is_new());
    }

    #[test]
    fn test_first_occurrence_wins() {
        let old = vec![entry("dup", 1, 0), entry("dup", 2, 100)];
        let new = vec![entry("dup", 3, 0), entry("dup", 4, 100)];

        let pairs = match_entries(&old, &new, MatchStrategy::Path);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].old.unwrap().crc32(), 1);
        assert!(pairs[1].is_new());
    }

    #[test]
    fn test_content_fallback() {
        let old = vec![entry("old-name", 7, 0), entry("other", 8, 100)];
        let new = vec![entry("new-name", 7, 0), entry("unrelated", 9, 100)];

        assert!(match_entries(&old, &new, MatchStrategy::Path).iter().all(MatchedEntryPair::is_new));

        let pairs = match_entries(&old, &new, MatchStrategy::PathThenContent);
        assert_eq!(pairs[0].old.unwrap().path(), b"old-name");
        assert!(pairs[1].is_new());
    }

    #[test]
    fn test_path_match_beats_content() {
        let old = vec![entry("twin", 7, 0), entry("a", 7, 100)];
        let new = vec![entry("a", 7, 0)];

        let pairs = match_entries(&old, &new, MatchStrategy::PathThenContent);
        assert_eq!(pairs[0].old.unwrap().path(), b"a");
    }

    #[test]
    fn test_empty_archives() {
        assert!(match_entries(&[], &[], MatchStrategy::Path).is_empty());
        let new = vec![entry("only", 1, 0)];
        assert!(match_entries(&[], &new, MatchStrategy::Path)[0].is_new());
    }
}
