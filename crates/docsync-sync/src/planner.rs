//! Sync planning
//!
//! Turns reconciler output and a [`SyncStrategy`] into an ordered list of
//! [`SyncAction`]s. Planning is pure: it reads snapshots and never touches
//! the filesystem.

use crate::reconcile::MatchResult;
use crate::snapshot::FolderSnapshot;
use docsync_config::SyncConfig;
use docsync_types::{ContentHash, Error, FileRecord, FileSize, RelativePath, Result, RootId, SyncStrategy};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reason attached to skips of suspected renames
pub const SUSPECTED_RENAME: &str = "suspected rename";

/// One step of a sync plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncAction {
    /// Stream `source` to `destination` and verify the result
    Copy {
        /// File to copy
        source: PathBuf,
        /// Target path
        destination: PathBuf,
        /// Scanned root receiving the copy, even when a target folder redirects it
        destination_root: PathBuf,
        /// Expected digest of the copied bytes
        content_hash: ContentHash,
        /// Size of the source when it was scanned
        size_bytes: FileSize,
        /// Whether an existing destination is replaced
        overwrite: bool,
    },
    /// Move `source` to `destination`
    Rename {
        /// File to move
        source: PathBuf,
        /// Target path
        destination: PathBuf,
        /// Root the source belongs to
        source_root: PathBuf,
        /// Root the destination belongs to
        destination_root: PathBuf,
        /// Digest the moved bytes must keep
        content_hash: ContentHash,
    },
    /// Nothing is done; surfaced for review
    Skip {
        /// File the skip concerns
        source: PathBuf,
        /// Its counterpart, if any
        destination: Option<PathBuf>,
        /// Human-readable reason
        reason: String,
    },
}

impl SyncAction {
    /// Name of the action kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Copy { .. } => "copy",
            Self::Rename { .. } => "rename",
            Self::Skip { .. } => "skip",
        }
    }

    /// Source path
    pub fn source(&self) -> &Path {
        match self {
            Self::Copy { source, .. } | Self::Rename { source, .. } | Self::Skip { source, .. } => {
                source
            }
        }
    }

    /// Destination path
    pub fn destination(&self) -> Option<&Path> {
        match self {
            Self::Copy { destination, .. } | Self::Rename { destination, .. } => Some(destination),
            Self::Skip { destination, .. } => destination.as_deref(),
        }
    }

    /// Reason of a skip
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Skip { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Whether the action changes the filesystem
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Self::Skip { .. })
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip { source, reason, .. } => {
                write!(f, "skip {} ({})", source.display(), reason)
            }
            _ => write!(
                f,
                "{} {} -> {}",
                self.kind_name(),
                self.source().display(),
                self.destination().unwrap_or_else(|| Path::new("")).display()
            ),
        }
    }
}

/// Ordered, immutable list of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    strategy: SyncStrategy,
    actions: Vec<SyncAction>,
}

impl SyncPlan {
    /// Wrap an action list
    pub fn new(strategy: SyncStrategy, actions: Vec<SyncAction>) -> Self {
        Self { strategy, actions }
    }

    /// Strategy the plan was built with
    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    /// Actions in execution order
    pub fn actions(&self) -> &[SyncAction] {
        &self.actions
    }

    /// Number of actions
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the plan has no actions
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Whether executing the plan would change nothing
    pub fn is_noop(&self) -> bool {
        !self.actions.iter().any(SyncAction::is_mutating)
    }

    /// Number of actions of the given kind ("copy", "rename" or "skip")
    pub fn count(&self, kind: &str) -> usize {
        self.actions.iter().filter(|a| a.kind_name() == kind).count()
    }

    /// Bytes the copies will write
    pub fn bytes_to_copy(&self) -> FileSize {
        self.actions
            .iter()
            .map(|a| match a {
                SyncAction::Copy { size_bytes, .. } => *size_bytes,
                _ => 0,
            })
            .sum()
    }
}

/// Planner settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerOptions {
    /// Conflict resolution policy
    pub strategy: SyncStrategy,
    /// Suffix for kept-both copies
    pub copy_suffix: String,
    /// Folder receiving new files destined for root 1, instead of root 1 itself
    pub target_root1: Option<PathBuf>,
    /// Folder receiving new files destined for root 2, instead of root 2 itself
    pub target_root2: Option<PathBuf>,
}

impl PlannerOptions {
    /// Build options from the `sync` configuration section
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            strategy: config.strategy,
            copy_suffix: config.copy_suffix.clone(),
            target_root1: None,
            target_root2: None,
        }
    }

    /// Use `strategy`
    pub fn with_strategy(mut self, strategy: SyncStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Root1,
    Root2,
}

/// Destination of copies into one root
struct Target<'a> {
    snapshot: &'a FolderSnapshot,
    base: &'a Path,
}

/// Builds [`SyncPlan`]s
#[derive(Debug, Clone, Default)]
pub struct SyncPlanner {
    options: PlannerOptions,
}

impl SyncPlanner {
    /// Create a planner
    pub fn new(options: PlannerOptions) -> Self {
        Self { options }
    }

    /// Planner settings
    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    /// Build the plan for `matches`, the reconciliation of `root1` and `root2`.
    ///
    /// Exact matches produce nothing and suspected duplicates produce a skip;
    /// this never emits a rename.
    pub fn plan(
        &self,
        root1: &FolderSnapshot,
        root2: &FolderSnapshot,
        matches: &[MatchResult],
    ) -> SyncPlan {
        let into1 = Target {
            snapshot: root1,
            base: self.options.target_root1.as_deref().unwrap_or(root1.root()),
        };
        let into2 = Target {
            snapshot: root2,
            base: self.options.target_root2.as_deref().unwrap_or(root2.root()),
        };

        // Unique copies claim their paths first so suffixes never collide with them.
        let mut claimed: HashSet<PathBuf> = matches
            .iter()
            .filter_map(|m| match m {
                MatchResult::UniqueToRoot1 { relative_path, .. } => {
                    Some(relative_path.resolve(into2.base))
                }
                MatchResult::UniqueToRoot2 { relative_path, .. } => {
                    Some(relative_path.resolve(into1.base))
                }
                _ => None,
            })
            .collect();

        let mut actions = Vec::new();
        for m in matches {
            match m {
                MatchResult::ExactMatch { .. } => {}
                MatchResult::UniqueToRoot1 { record, .. } => {
                    actions.push(copy_action(record, &into2, &record.relative_path, false));
                }
                MatchResult::UniqueToRoot2 { record, .. } => {
                    actions.push(copy_action(record, &into1, &record.relative_path, false));
                }
                MatchResult::PartialMatch {
                    relative_path,
                    root1: side1,
                    root2: side2,
                } => {
                    if let ([record1], [record2]) = (side1.as_slice(), side2.as_slice()) {
                        if let Some(winner) = self.resolve(record1, record2) {
                            actions.push(match winner {
                                Side::Root1 => overwrite_action(record1, record2, root2.root()),
                                Side::Root2 => overwrite_action(record2, record1, root1.root()),
                            });
                            continue;
                        }
                        debug!(
                            "Keeping both versions of {} under {}",
                            relative_path, self.options.strategy
                        );
                    }
                    for record in side1 {
                        actions.push(self.keep_both_action(record, &into2, &mut claimed));
                    }
                    for record in side2 {
                        actions.push(self.keep_both_action(record, &into1, &mut claimed));
                    }
                }
                MatchResult::SuspectedDuplicate { root1, root2, .. } => {
                    actions.push(SyncAction::Skip {
                        source: root1.absolute_path.clone(),
                        destination: Some(root2.absolute_path.clone()),
                        reason: SUSPECTED_RENAME.to_string(),
                    });
                }
            }
        }

        debug!("Planned {} actions", actions.len());
        SyncPlan::new(self.options.strategy, actions)
    }

    /// Turn a reviewed suspected duplicate into a rename inside `rename_in`,
    /// moving that root's record to the relative path of its twin.
    pub fn plan_rename(
        &self,
        root1: &FolderSnapshot,
        root2: &FolderSnapshot,
        suspected: &MatchResult,
        rename_in: RootId,
    ) -> Result<SyncAction> {
        let MatchResult::SuspectedDuplicate {
            root1: record1,
            root2: record2,
            ..
        } = suspected
        else {
            return Err(Error::other(format!(
                "Only suspected duplicates can become renames, got {}",
                suspected.case_name()
            )));
        };

        let (snapshot, record, target) = if rename_in == RootId::ROOT1 {
            (root1, record1, &record2.relative_path)
        } else if rename_in == RootId::ROOT2 {
            (root2, record2, &record1.relative_path)
        } else {
            return Err(Error::other(format!("Unknown root {}", rename_in)));
        };

        let destination = target.resolve(snapshot.root());
        if snapshot.contains_path(target) {
            return Err(Error::DestinationExists { path: destination });
        }

        Ok(SyncAction::Rename {
            source: record.absolute_path.clone(),
            destination,
            source_root: snapshot.root().to_path_buf(),
            destination_root: snapshot.root().to_path_buf(),
            content_hash: record.content_hash,
        })
    }

    /// Winner of a same-path conflict, or `None` to keep both
    fn resolve(&self, record1: &FileRecord, record2: &FileRecord) -> Option<Side> {
        let ordering = match self.options.strategy {
            SyncStrategy::KeepBoth => return None,
            SyncStrategy::KeepNewest => record1.modified_time.cmp(&record2.modified_time),
            SyncStrategy::KeepLargest => record1.size_bytes.cmp(&record2.size_bytes),
        };
        match ordering {
            Ordering::Greater => Some(Side::Root1),
            Ordering::Less => Some(Side::Root2),
            Ordering::Equal => {
                debug!(
                    "Tie on {} for {}, falling back to keep_both",
                    self.options.strategy, record1.relative_path
                );
                None
            }
        }
    }

    /// Copy `record` into `target` under the first unused suffixed name
    fn keep_both_action(
        &self,
        record: &FileRecord,
        target: &Target<'_>,
        claimed: &mut HashSet<PathBuf>,
    ) -> SyncAction {
        let mut n = 1;
        let relative = loop {
            let candidate = record.relative_path.with_suffix(&self.options.copy_suffix, n);
            let absolute = candidate.resolve(target.base);
            if !target.snapshot.contains_path(&candidate) && !claimed.contains(&absolute) {
                claimed.insert(absolute);
                break candidate;
            }
            n += 1;
        };
        copy_action(record, target, &relative, false)
    }
}

fn copy_action(
    record: &FileRecord,
    target: &Target<'_>,
    relative: &RelativePath,
    overwrite: bool,
) -> SyncAction {
    SyncAction::Copy {
        source: record.absolute_path.clone(),
        destination: relative.resolve(target.base),
        destination_root: target.snapshot.root().to_path_buf(),
        content_hash: record.content_hash,
        size_bytes: record.size_bytes,
        overwrite,
    }
}

/// Replace `loser` in place with `winner`'s content
fn overwrite_action(winner: &FileRecord, loser: &FileRecord, loser_root: &Path) -> SyncAction {
    SyncAction::Copy {
        source: winner.absolute_path.clone(),
        destination: loser.absolute_path.clone(),
        destination_root: loser_root.to_path_buf(),
        content_hash: winner.content_hash,
        size_bytes: winner.size_bytes,
        overwrite: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;
    use crate::reconcile::Reconciler;
    use rstest::rstest;
    use std::time::{Duration, SystemTime};

    fn rec(root_id: RootId, path: &str, content: &[u8], mtime_secs: u64) -> FileRecord {
        let root = if root_id == RootId::ROOT1 { "/a" } else { "/b" };
        FileRecord {
            root_id,
            relative_path: RelativePath::new(path).unwrap(),
            absolute_path: PathBuf::from(format!("{}/{}", root, path)),
            size_bytes: content.len() as u64,
            modified_time: SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_secs),
            content_hash: hash_bytes(content),
            skip_extraction: true,
        }
    }

    fn snap(root_id: RootId, records: Vec<FileRecord>) -> FolderSnapshot {
        let root = if root_id == RootId::ROOT1 { "/a" } else { "/b" };
        FolderSnapshot::from_records(root_id, root, records)
    }

    fn plan_for(strategy: SyncStrategy, a: &FolderSnapshot, b: &FolderSnapshot) -> SyncPlan {
        let matches = Reconciler::reconcile(a, b);
        SyncPlanner::new(PlannerOptions::default().with_strategy(strategy)).plan(a, b, &matches)
    }

    #[rstest]
    #[case(SyncStrategy::KeepBoth)]
    #[case(SyncStrategy::KeepNewest)]
    #[case(SyncStrategy::KeepLargest)]
    fn test_synced_roots_give_empty_plan(#[case] strategy: SyncStrategy) {
        let a = snap(RootId::ROOT1, vec![rec(RootId::ROOT1, "x.txt", b"x", 1)]);
        let b = snap(RootId::ROOT2, vec![rec(RootId::ROOT2, "x.txt", b"x", 9)]);

        assert!(plan_for(strategy, &a, &b).is_empty());
    }

    #[rstest]
    #[case(SyncStrategy::KeepBoth)]
    #[case(SyncStrategy::KeepNewest)]
    #[case(SyncStrategy::KeepLargest)]
    fn test_suspected_rename_is_skipped(#[case] strategy: SyncStrategy) {
        let a = snap(
            RootId::ROOT1,
            vec![rec(RootId::ROOT1, "sub/doc.pdf", b"X", 0), rec(RootId::ROOT1, "new.pdf", b"Y", 0)],
        );
        let b = snap(
            RootId::ROOT2,
            vec![
                rec(RootId::ROOT2, "sub/doc.pdf", b"X", 0),
                rec(RootId::ROOT2, "sub2/doc2.pdf", b"Y", 0),
            ],
        );

        let plan = plan_for(strategy, &a, &b);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions()[0].reason(), Some(SUSPECTED_RENAME));
        assert!(plan.is_noop());
    }

    #[test]
    fn test_keep_newest_overwrites_older() {
        let a = snap(RootId::ROOT1, vec![rec(RootId::ROOT1, "report.pdf", b"A", 100)]);
        let b = snap(RootId::ROOT2, vec![rec(RootId::ROOT2, "report.pdf", b"B", 200)]);

        let plan = plan_for(SyncStrategy::KeepNewest, &a, &b);

        assert_eq!(
            plan.actions(),
            &[SyncAction::Copy {
                source: PathBuf::from("/b/report.pdf"),
                destination: PathBuf::from("/a/report.pdf"),
                destination_root: PathBuf::from("/a"),
                content_hash: hash_bytes(b"B"),
                size_bytes: 1,
                overwrite: true,
            }]
        );
    }

    #[test]
    fn test_keep_largest_overwrites_smaller() {
        let a = snap(RootId::ROOT1, vec![rec(RootId::ROOT1, "r.pdf", b"large", 0)]);
        let b = snap(RootId::ROOT2, vec![rec(RootId::ROOT2, "r.pdf", b"sm", 0)]);

        let plan = plan_for(SyncStrategy::KeepLargest, &a, &b);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan.actions()[0].source(), Path::new("/a/r.pdf"));
        assert_eq!(plan.actions()[0].destination(), Some(Path::new("/b/r.pdf")));
    }

    #[rstest]
    #[case(SyncStrategy::KeepBoth, b"AA", b"BB", 5, 5)]
    #[case(SyncStrategy::KeepNewest, b"AA", b"BB", 7, 7)]
    #[case(SyncStrategy::KeepLargest, b"AA", b"BB", 1, 9)]
    fn test_ties_keep_both(
        #[case] strategy: SyncStrategy,
        #[case] content1: &[u8],
        #[case] content2: &[u8],
        #[case] mtime1: u64,
        #[case] mtime2: u64,
    ) {
        let a = snap(RootId::ROOT1, vec![rec(RootId::ROOT1, "d/report.pdf", content1, mtime1)]);
        let b = snap(RootId::ROOT2, vec![rec(RootId::ROOT2, "d/report.pdf", content2, mtime2)]);

        let plan = plan_for(strategy, &a, &b);
        let destinations: Vec<_> = plan.actions().iter().filter_map(SyncAction::destination).collect();

        assert_eq!(
            destinations,
            vec![Path::new("/b/d/report_copy.pdf"), Path::new("/a/d/report_copy.pdf")]
        );
    }

    #[test]
    fn test_first_unused_suffix_wins() {
        let a = snap(
            RootId::ROOT1,
            vec![rec(RootId::ROOT1, "n.txt", b"1", 0), rec(RootId::ROOT1, "n_copy2.txt", b"q", 0)],
        );
        let b = snap(
            RootId::ROOT2,
            vec![rec(RootId::ROOT2, "n.txt", b"2", 0), rec(RootId::ROOT2, "n_copy.txt", b"z", 0)],
        );

        let plan = plan_for(SyncStrategy::KeepBoth, &a, &b);
        let destinations: Vec<_> = plan.actions().iter().filter_map(SyncAction::destination).collect();

        // n_copy.txt exists in b and n_copy2.txt is claimed by a's unique copy
        assert!(destinations.contains(&Path::new("/b/n_copy3.txt")));
        assert!(destinations.contains(&Path::new("/a/n_copy.txt")));
        assert!(destinations.contains(&Path::new("/b/n_copy2.txt")));
    }

    #[test]
    fn test_target_root_override() {
        let a = snap(RootId::ROOT1, vec![rec(RootId::ROOT1, "only.txt", b"o", 0)]);
        let b = snap(RootId::ROOT2, vec![]);
        let matches = Reconciler::reconcile(&a, &b);
        let options = PlannerOptions {
            target_root2: Some(PathBuf::from("/b/incoming")),
            ..PlannerOptions::default()
        };

        let plan = SyncPlanner::new(options).plan(&a, &b, &matches);

        assert_eq!(plan.actions()[0].destination(), Some(Path::new("/b/incoming/only.txt")));
        assert!(matches!(
            &plan.actions()[0],
            SyncAction::Copy { destination_root, .. } if destination_root == Path::new("/b")
        ));
        assert_eq!(plan.bytes_to_copy(), 1);
    }

    #[test]
    fn test_plan_rename() {
        let a = snap(RootId::ROOT1, vec![rec(RootId::ROOT1, "new.pdf", b"Y", 0)]);
        let b = snap(RootId::ROOT2, vec![rec(RootId::ROOT2, "sub2/doc2.pdf", b"Y", 0)]);
        let matches = Reconciler::reconcile(&a, &b);
        let planner = SyncPlanner::default();

        let action = planner.plan_rename(&a, &b, &matches[0], RootId::ROOT1).unwrap();
        assert_eq!(action.source(), Path::new("/a/new.pdf"));
        assert_eq!(action.destination(), Some(Path::new("/a/sub2/doc2.pdf")));

        let action = planner.plan_rename(&a, &b, &matches[0], RootId::ROOT2).unwrap();
        assert_eq!(action.destination(), Some(Path::new("/b/new.pdf")));
    }

    #[test]
    fn test_plan_rename_rejects_other_cases() {
        let a = snap(RootId::ROOT1, vec![rec(RootId::ROOT1, "only.txt", b"o", 0)]);
        let b = snap(RootId::ROOT2, vec![]);
        let matches = Reconciler::reconcile(&a, &b);

        let result = SyncPlanner::default().plan_rename(&a, &b, &matches[0], RootId::ROOT1);
        assert!(result.is_err());
    }

    #[test]
    fn test_action_display() {
        let action = SyncAction::Skip {
            source: PathBuf::from("/a/x"),
            destination: None,
            reason: SUSPECTED_RENAME.to_string(),
        };
        assert_eq!(action.to_string(), "skip /a/x (suspected rename)");
    }
}
