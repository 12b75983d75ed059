//! Three-phase reconciliation of two snapshots
//!
//! 1. Paths present in only one root become `UniqueToRoot1` / `UniqueToRoot2`.
//! 2. Paths present in both roots are paired by content hash: equal hashes
//!    become `ExactMatch`, the remainder of each side a `PartialMatch`.
//! 3. Unique records whose hash also occurs among the other root's unique
//!    records become `SuspectedDuplicate`s, unless that hash already took part
//!    in an exact or partial match.
//!
//! Output is sorted by relative path, then hash, so identical inputs always
//! produce identical output.

use crate::snapshot::FolderSnapshot;
use docsync_types::{ContentHash, FileRecord, FileSize, RelativePath};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Classified relation between the two roots at one relative path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "case", rename_all = "snake_case")]
pub enum MatchResult {
    /// Same path, same content
    ExactMatch {
        /// Shared relative path
        relative_path: RelativePath,
        /// Record in root 1
        root1: FileRecord,
        /// Record in root 2
        root2: FileRecord,
    },
    /// Same path, different content; either side may be empty when surplus
    /// same-path records found no equal-hash partner
    PartialMatch {
        /// Shared relative path
        relative_path: RelativePath,
        /// Unpaired records in root 1
        root1: Vec<FileRecord>,
        /// Unpaired records in root 2
        root2: Vec<FileRecord>,
    },
    /// Path only present in root 1
    UniqueToRoot1 {
        /// Relative path
        relative_path: RelativePath,
        /// The record
        record: FileRecord,
    },
    /// Path only present in root 2
    UniqueToRoot2 {
        /// Relative path
        relative_path: RelativePath,
        /// The record
        record: FileRecord,
    },
    /// Same content at different paths, probably a rename or move
    SuspectedDuplicate {
        /// Relative path of the root 1 record
        relative_path: RelativePath,
        /// Record in root 1
        root1: FileRecord,
        /// Record in root 2
        root2: FileRecord,
    },
}

impl MatchResult {
    /// Relative path the result is keyed by
    pub fn relative_path(&self) -> &RelativePath {
        match self {
            Self::ExactMatch { relative_path, .. }
            | Self::PartialMatch { relative_path, .. }
            | Self::UniqueToRoot1 { relative_path, .. }
            | Self::UniqueToRoot2 { relative_path, .. }
            | Self::SuspectedDuplicate { relative_path, .. } => relative_path,
        }
    }

    /// Short name of the case
    pub fn case_name(&self) -> &'static str {
        match self {
            Self::ExactMatch { .. } => "exact_match",
            Self::PartialMatch { .. } => "partial_match",
            Self::UniqueToRoot1 { .. } => "unique_to_root1",
            Self::UniqueToRoot2 { .. } => "unique_to_root2",
            Self::SuspectedDuplicate { .. } => "suspected_duplicate",
        }
    }

    /// Every record carried by the result
    pub fn records(&self) -> Vec<&FileRecord> {
        match self {
            Self::ExactMatch { root1, root2, .. } | Self::SuspectedDuplicate { root1, root2, .. } => {
                vec![root1, root2]
            }
            Self::PartialMatch { root1, root2, .. } => root1.iter().chain(root2).collect(),
            Self::UniqueToRoot1 { record, .. } | Self::UniqueToRoot2 { record, .. } => {
                vec![record]
            }
        }
    }

    /// Content hashes carried by the result, ascending and deduplicated
    pub fn hashes(&self) -> Vec<ContentHash> {
        let mut hashes: Vec<_> = self.records().iter().map(|r| r.content_hash).collect();
        hashes.sort_unstable();
        hashes.dedup();
        hashes
    }

    fn rank(&self) -> u8 {
        match self {
            Self::ExactMatch { .. } => 0,
            Self::PartialMatch { .. } => 1,
            Self::UniqueToRoot1 { .. } => 2,
            Self::UniqueToRoot2 { .. } => 3,
            Self::SuspectedDuplicate { .. } => 4,
        }
    }

    /// Total order key: path, hashes, case, then the records' absolute paths
    fn order_key(&self) -> (RelativePath, Vec<ContentHash>, u8, Vec<String>) {
        (
            self.relative_path().clone(),
            self.hashes(),
            self.rank(),
            self.records().iter().map(|r| r.sort_key()).collect(),
        )
    }
}

/// Reconciles two [`FolderSnapshot`]s
pub struct Reconciler;

impl Reconciler {
    /// Classify every record of both snapshots.
    ///
    /// `root1` and `root2` fill the `root1` / `root2` sides of the results
    /// regardless of the snapshots' own root ids.
    pub fn reconcile(root1: &FolderSnapshot, root2: &FolderSnapshot) -> Vec<MatchResult> {
        let mut results = Vec::new();
        let mut unique1: Vec<&FileRecord> = Vec::new();
        let mut unique2: Vec<&FileRecord> = Vec::new();
        let mut matched_hashes: HashSet<ContentHash> = HashSet::new();

        // Phase 1: path partition; shared paths fall through to phase 2
        for path in root1.paths() {
            if !root2.contains_path(path) {
                unique1.extend(root1.files_at(path));
                continue;
            }

            // Phase 2: pair by hash in ascending absolute-path order
            let side1 = root1.files_at(path);
            let side2 = root2.files_at(path);
            let mut taken2 = vec![false; side2.len()];
            let mut left1 = Vec::new();

            for record1 in side1 {
                let partner = side2
                    .iter()
                    .enumerate()
                    .find(|(i, r)| !taken2[*i] && r.content_hash == record1.content_hash);
                match partner {
                    Some((i, record2)) => {
                        taken2[i] = true;
                        matched_hashes.insert(record1.content_hash);
                        results.push(MatchResult::ExactMatch {
                            relative_path: path.clone(),
                            root1: record1.clone(),
                            root2: record2.clone(),
                        });
                    }
                    None => left1.push(record1.clone()),
                }
            }

            let left2: Vec<FileRecord> = side2
                .iter()
                .zip(&taken2)
                .filter(|(_, taken)| !**taken)
                .map(|(r, _)| r.clone())
                .collect();

            if !left1.is_empty() || !left2.is_empty() {
                matched_hashes.extend(left1.iter().chain(&left2).map(|r| r.content_hash));
                results.push(MatchResult::PartialMatch {
                    relative_path: path.clone(),
                    root1: left1,
                    root2: left2,
                });
            }
        }

        for path in root2.paths().filter(|p| !root1.contains_path(p)) {
            unique2.extend(root2.files_at(path));
        }

        // Phase 3: cross-path hash matching among the uniques
        let (suspected, unique1, unique2) = Self::pair_suspected(unique1, unique2, &matched_hashes);
        results.extend(suspected);
        results.extend(unique1.into_iter().map(|record| MatchResult::UniqueToRoot1 {
            relative_path: record.relative_path.clone(),
            record: record.clone(),
        }));
        results.extend(unique2.into_iter().map(|record| MatchResult::UniqueToRoot2 {
            relative_path: record.relative_path.clone(),
            record: record.clone(),
        }));

        results.sort_by_cached_key(MatchResult::order_key);
        results
    }

    /// Pair unique records sharing a hash across roots.
    ///
    /// Both sides are taken in ascending absolute-path order and zipped; a
    /// surplus record on the longer side is paired with the first record of
    /// the shorter side, so every record with a twin in the other root is
    /// held back for review.
    fn pair_suspected<'a>(
        unique1: Vec<&'a FileRecord>,
        unique2: Vec<&'a FileRecord>,
        excluded: &HashSet<ContentHash>,
    ) -> (Vec<MatchResult>, Vec<&'a FileRecord>, Vec<&'a FileRecord>) {
        let group = |records: &[&'a FileRecord]| {
            let mut by_hash: BTreeMap<ContentHash, Vec<&'a FileRecord>> = BTreeMap::new();
            for record in records {
                if !excluded.contains(&record.content_hash) {
                    by_hash.entry(record.content_hash).or_default().push(*record);
                }
            }
            for members in by_hash.values_mut() {
                members.sort_by_key(|r| r.sort_key());
            }
            by_hash
        };
        let by_hash1 = group(&unique1);
        let by_hash2 = group(&unique2);

        let mut suspected = Vec::new();
        let mut consumed: HashSet<ContentHash> = HashSet::new();

        for (hash, members1) in &by_hash1 {
            let Some(members2) = by_hash2.get(hash) else {
                continue;
            };
            consumed.insert(*hash);

            let pairs = members1.len().max(members2.len());
            for i in 0..pairs {
                let record1 = members1.get(i).unwrap_or(&members1[0]);
                let record2 = members2.get(i).unwrap_or(&members2[0]);
                suspected.push(MatchResult::SuspectedDuplicate {
                    relative_path: record1.relative_path.clone(),
                    root1: (*record1).clone(),
                    root2: (*record2).clone(),
                });
            }
        }

        let keep = |records: Vec<&'a FileRecord>| -> Vec<&'a FileRecord> {
            records
                .into_iter()
                .filter(|r| !consumed.contains(&r.content_hash))
                .collect()
        };
        (suspected, keep(unique1), keep(unique2))
    }
}

/// Counts and space estimates over a reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Exact matches
    pub exact: usize,
    /// Records taking part in partial matches, both sides
    pub partial_records: usize,
    /// Records only in root 1
    pub unique_to_root1: usize,
    /// Records only in root 2
    pub unique_to_root2: usize,
    /// Suspected duplicate pairs
    pub suspected_pairs: usize,
    /// Bytes that copying root 2's unique records would add to root 1
    pub space_needed_root1: FileSize,
    /// Bytes that copying root 1's unique records would add to root 2
    pub space_needed_root2: FileSize,
}

impl ReconcileSummary {
    /// Summarise a reconciliation result
    pub fn from_matches(matches: &[MatchResult]) -> Self {
        matches.iter().fold(Self::default(), |mut summary, m| {
            match m {
                MatchResult::ExactMatch { .. } => summary.exact += 1,
                MatchResult::PartialMatch { root1, root2, .. } => {
                    summary.partial_records += root1.len() + root2.len();
                }
                MatchResult::UniqueToRoot1 { record, .. } => {
                    summary.unique_to_root1 += 1;
                    summary.space_needed_root2 += record.size_bytes;
                }
                MatchResult::UniqueToRoot2 { record, .. } => {
                    summary.unique_to_root2 += 1;
                    summary.space_needed_root1 += record.size_bytes;
                }
                MatchResult::SuspectedDuplicate { .. } => summary.suspected_pairs += 1,
            }
            summary
        })
    }

    /// Whether the two roots already agree
    pub fn is_in_sync(&self) -> bool {
        self.partial_records == 0
            && self.unique_to_root1 == 0
            && self.unique_to_root2 == 0
            && self.suspected_pairs == 0
    }
}
