//! Duplicate classification across one or more snapshots
//!
//! Content groups share a digest; name groups share a case-folded file name
//! but disagree on content. The two groupings are independent and may
//! overlap. Neither decides which member to keep.

use crate::snapshot::FolderSnapshot;
use docsync_types::{ContentHash, FileRecord, FileSize, RootId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// How records are grouped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    /// Identical content at two or more locations
    Content,
    /// Same file name, different content
    Name,
}

impl std::str::FromStr for GroupingMode {
    type Err = docsync_types::Error;

    fn from_str(s: &str) -> docsync_types::Result<Self> {
        match s {
            "content" => Ok(Self::Content),
            "name" => Ok(Self::Name),
            other => Err(docsync_types::Error::config(format!(
                "Unknown grouping mode '{}' (expected content or name)",
                other
            ))),
        }
    }
}

/// Key shared by the members of a group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// Content digest
    Content(ContentHash),
    /// Case-folded file name, extension included
    Name(String),
}

/// Two or more records sharing a key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    key: GroupKey,
    members: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Group key
    pub fn key(&self) -> &GroupKey {
        &self.key
    }

    /// Members in ascending absolute-path order
    pub fn members(&self) -> &[FileRecord] {
        &self.members
    }

    /// Number of members, always at least two
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the group has no members
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Roots the group spans
    pub fn roots(&self) -> BTreeSet<RootId> {
        self.members.iter().map(|m| m.root_id).collect()
    }

    /// Whether members live in more than one root
    pub fn is_cross_root(&self) -> bool {
        self.roots().len() > 1
    }

    /// Combined size of every member
    pub fn total_bytes(&self) -> FileSize {
        self.members.iter().map(|m| m.size_bytes).sum()
    }

    /// Bytes freed by deleting all members but one
    pub fn reclaimable_bytes(&self) -> FileSize {
        let largest = self.members.iter().map(|m| m.size_bytes).max().unwrap_or(0);
        self.total_bytes() - largest
    }

    /// Bytes freed by keeping the first member under `keep_prefix`, or the
    /// first member overall when none lives there
    pub fn reclaimable_keeping(&self, keep_prefix: &Path) -> FileSize {
        let kept = self
            .members
            .iter()
            .find(|m| m.absolute_path.starts_with(keep_prefix))
            .or_else(|| self.members.first())
            .map_or(0, |m| m.size_bytes);
        self.total_bytes() - kept
    }
}

/// Enumerates duplicate groups over a merged file universe
pub struct DuplicateClassifier;

impl DuplicateClassifier {
    /// Group every record of `snapshots` by `mode`, ordered by key
    pub fn classify<'a>(
        snapshots: impl IntoIterator<Item = &'a FolderSnapshot>,
        mode: GroupingMode,
    ) -> Vec<DuplicateGroup> {
        let records = Self::merge(snapshots);
        match mode {
            GroupingMode::Content => Self::content_duplicates(&records),
            GroupingMode::Name => Self::name_duplicates(&records),
        }
    }

    /// Every record once per absolute path, ascending
    fn merge<'a>(snapshots: impl IntoIterator<Item = &'a FolderSnapshot>) -> Vec<&'a FileRecord> {
        let mut seen = HashSet::new();
        let mut records: Vec<&FileRecord> = snapshots
            .into_iter()
            .flat_map(FolderSnapshot::records)
            .filter(|r| seen.insert(r.absolute_path.clone()))
            .collect();
        records.sort_by_key(|r| r.sort_key());
        records
    }

    fn content_duplicates(records: &[&FileRecord]) -> Vec<DuplicateGroup> {
        let mut by_hash: BTreeMap<ContentHash, Vec<FileRecord>> = BTreeMap::new();
        for record in records {
            by_hash
                .entry(record.content_hash)
                .or_default()
                .push((*record).clone());
        }

        by_hash
            .into_iter()
            .filter(|(_, members)| members.len() > 1)
            .map(|(hash, members)| DuplicateGroup {
                key: GroupKey::Content(hash),
                members,
            })
            .collect()
    }

    fn name_duplicates(records: &[&FileRecord]) -> Vec<DuplicateGroup> {
        let mut by_name: BTreeMap<String, Vec<FileRecord>> = BTreeMap::new();
        for record in records {
            by_name
                .entry(normalize_name(record.relative_path.file_name()))
                .or_default()
                .push((*record).clone());
        }

        by_name
            .into_iter()
            .filter(|(_, members)| {
                members
                    .iter()
                    .map(|m| m.content_hash)
                    .collect::<HashSet<_>>()
                    .len()
                    > 1
            })
            .map(|(name, members)| DuplicateGroup {
                key: GroupKey::Name(name),
                members,
            })
            .collect()
    }
}

/// Case-fold a file name, keeping its extension as part of the key
pub fn normalize_name(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;
    use docsync_types::RelativePath;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn rec(root_id: RootId, root: &str, path: &str, content: &[u8]) -> FileRecord {
        FileRecord {
            root_id,
            relative_path: RelativePath::new(path).unwrap(),
            absolute_path: PathBuf::from(format!("{}/{}", root, path)),
            size_bytes: content.len() as u64,
            modified_time: SystemTime::UNIX_EPOCH,
            content_hash: hash_bytes(content),
            skip_extraction: true,
        }
    }

    fn fixtures() -> (FolderSnapshot, FolderSnapshot) {
        let a = FolderSnapshot::from_records(
            RootId::ROOT1,
            "/a",
            vec![
                rec(RootId::ROOT1, "/a", "report.pdf", b"version one"),
                rec(RootId::ROOT1, "/a", "backup/report.pdf", b"version one"),
                rec(RootId::ROOT1, "/a", "notes.txt", b"n"),
            ],
        );
        let b = FolderSnapshot::from_records(
            RootId::ROOT2,
            "/b",
            vec![
                rec(RootId::ROOT2, "/b", "Report.PDF", b"version two!"),
                rec(RootId::ROOT2, "/b", "old/notes.txt", b"n"),
            ],
        );
        (a, b)
    }

    #[test]
    fn test_content_groups() {
        let (a, b) = fixtures();
        let groups = DuplicateClassifier::classify([&a, &b], GroupingMode::Content);

        assert_eq!(groups.len(), 2);
        for group in &groups {
            assert!(group.len() >= 2);
        }

        let report = groups
            .iter()
            .find(|g| g.key() == &GroupKey::Content(hash_bytes(b"version one")))
            .unwrap();
        assert!(!report.is_cross_root());
        assert_eq!(report.reclaimable_bytes(), 11);

        let notes = groups
            .iter()
            .find(|g| g.key() == &GroupKey::Content(hash_bytes(b"n")))
            .unwrap();
        assert!(notes.is_cross_root());
    }

    #[test]
    fn test_name_groups_need_differing_content() {
        let (a, b) = fixtures();
        let groups = DuplicateClassifier::classify([&a, &b], GroupingMode::Name);

        // notes.txt shares content everywhere, so only report.pdf conflicts
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key(), &GroupKey::Name("report.pdf".to_string()));
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn test_same_snapshot_twice_is_not_a_duplicate() {
        let (a, _) = fixtures();
        let groups = DuplicateClassifier::classify([&a, &a], GroupingMode::Content);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 2);
    }

    #[test]
    fn test_reclaimable_keeping_prefix() {
        let group = DuplicateGroup {
            key: GroupKey::Content(hash_bytes(b"x")),
            members: vec![
                rec(RootId::ROOT1, "/a", "x.bin", &[0; 10]),
                rec(RootId::ROOT2, "/b", "x.bin", &[0; 10]),
                rec(RootId::ROOT2, "/b", "y.bin", &[0; 10]),
            ],
        };

        assert_eq!(group.reclaimable_keeping(Path::new("/b")), 20);
        assert_eq!(group.reclaimable_keeping(Path::new("/elsewhere")), 20);
        assert_eq!(group.total_bytes(), 30);
    }

    #[test]
    fn test_grouping_mode_from_str() {
        assert_eq!("content".parse::<GroupingMode>().unwrap(), GroupingMode::Content);
        assert_eq!("name".parse::<GroupingMode>().unwrap(), GroupingMode::Name);
        assert!("size".parse::<GroupingMode>().is_err());
    }
}
