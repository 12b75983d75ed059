//! Snapshotter and path index
//!
//! A [`FolderSnapshot`] is an immutable, in-memory listing of every readable
//! regular file under one root, indexed by relative path and by content hash.
//! Snapshots are rebuilt for every reconciliation; nothing is cached on disk.

use crate::hash::hash_file;
use crate::progress::{ScanEvent, ScanReporter};
use docsync_config::ScanConfig;
use docsync_types::{
    ChunkSize, ContentHash, Error, FileRecord, FileSize, RelativePath, Result, RootId,
    WorkerCount,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Scan behaviour
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Read size used while hashing
    pub chunk_size: ChunkSize,
    /// Files hashed concurrently per root
    pub hash_workers: WorkerCount,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Skip files and directories whose name starts with a dot
    pub skip_hidden: bool,
    /// Lower-case extension allow-list; empty admits every file
    pub extensions: Vec<String>,
    /// Whether records may be handed to text extraction
    pub extract_text: bool,
    /// Files larger than this are flagged to skip extraction
    pub max_extract_size: FileSize,
}

impl ScanOptions {
    /// Build options from the `scan` configuration section
    pub fn from_config(config: &ScanConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            hash_workers: config.hash_workers,
            follow_symlinks: config.follow_symlinks,
            skip_hidden: config.skip_hidden,
            extensions: config
                .extensions
                .iter()
                .map(|ext| ext.to_ascii_lowercase())
                .collect(),
            extract_text: config.extract_text,
            max_extract_size: config.max_extract_size,
        }
    }

    fn admits_extension(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    fn skip_extraction(&self, size: FileSize) -> bool {
        !self.extract_text || size > self.max_extract_size
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&ScanConfig::default())
    }
}

/// An entry left out of a snapshot
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SkippedEntry {
    /// Path of the entry
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Immutable listing of one root
#[derive(Debug, Clone)]
pub struct FolderSnapshot {
    root_id: RootId,
    root: PathBuf,
    by_path: BTreeMap<RelativePath, Vec<FileRecord>>,
    by_hash: HashMap<ContentHash, Vec<(RelativePath, usize)>>,
    skipped: Vec<SkippedEntry>,
}

impl FolderSnapshot {
    /// Build a snapshot from already-computed records.
    ///
    /// Records sharing a relative path are kept in ascending absolute-path
    /// order, which is the pairing order used by the reconciler.
    pub fn from_records(
        root_id: RootId,
        root: impl Into<PathBuf>,
        records: impl IntoIterator<Item = FileRecord>,
    ) -> Self {
        let mut by_path: BTreeMap<RelativePath, Vec<FileRecord>> = BTreeMap::new();
        for record in records {
            by_path
                .entry(record.relative_path.clone())
                .or_default()
                .push(record);
        }

        let mut by_hash: HashMap<ContentHash, Vec<(RelativePath, usize)>> = HashMap::new();
        for (path, records) in &mut by_path {
            records.sort_by_key(FileRecord::sort_key);
            for (index, record) in records.iter().enumerate() {
                by_hash
                    .entry(record.content_hash)
                    .or_default()
                    .push((path.clone(), index));
            }
        }

        Self {
            root_id,
            root: root.into(),
            by_path,
            by_hash,
            skipped: Vec::new(),
        }
    }

    fn with_skipped(mut self, skipped: Vec<SkippedEntry>) -> Self {
        self.skipped = skipped;
        self
    }

    /// Root identifier
    pub fn root_id(&self) -> RootId {
        self.root_id
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of file records
    pub fn len(&self) -> usize {
        self.by_path.values().map(Vec::len).sum()
    }

    /// Whether the snapshot holds no records
    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }

    /// Sum of all record sizes
    pub fn total_bytes(&self) -> FileSize {
        self.records().map(|record| record.size_bytes).sum()
    }

    /// Relative paths in ascending order
    pub fn paths(&self) -> impl Iterator<Item = &RelativePath> {
        self.by_path.keys()
    }

    /// Whether any record lives at `path`
    pub fn contains_path(&self, path: &RelativePath) -> bool {
        self.by_path.contains_key(path)
    }

    /// Records at `path`, in pairing order
    pub fn files_at(&self, path: &RelativePath) -> &[FileRecord] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records whose content hashes to `hash`
    pub fn files_with_hash<'a>(
        &'a self,
        hash: &ContentHash,
    ) -> impl Iterator<Item = &'a FileRecord> + 'a {
        self.by_hash
            .get(hash)
            .into_iter()
            .flatten()
            .filter_map(|(path, index)| self.by_path.get(path).and_then(|v| v.get(*index)))
    }

    /// All records, ordered by relative path then absolute path
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.by_path.values().flatten()
    }

    /// Entries that could not be read during the scan
    pub fn skipped(&self) -> &[SkippedEntry] {
        &self.skipped
    }
}

/// Builds [`FolderSnapshot`]s from roots on disk
#[derive(Debug, Clone, Default)]
pub struct Snapshotter {
    options: ScanOptions,
    reporter: ScanReporter,
}

struct Candidate {
    path: PathBuf,
    relative_path: RelativePath,
}

impl Snapshotter {
    /// Create a snapshotter
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            reporter: ScanReporter::new(),
        }
    }

    /// Route progress and events through `reporter`
    pub fn with_reporter(mut self, reporter: ScanReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Progress reporter shared by every scan of this snapshotter
    pub fn reporter(&self) -> &ScanReporter {
        &self.reporter
    }

    /// Scan both roots of a reconciliation concurrently
    pub async fn scan_pair(
        &self,
        root1: impl AsRef<Path>,
        root2: impl AsRef<Path>,
    ) -> Result<(FolderSnapshot, FolderSnapshot)> {
        tokio::try_join!(
            self.scan(RootId::ROOT1, root1.as_ref()),
            self.scan(RootId::ROOT2, root2.as_ref())
        )
    }

    /// Enumerate and hash every admitted regular file under `root`.
    ///
    /// Unreadable entries are recorded as skipped; only an unavailable root
    /// fails the scan.
    #[tracing::instrument(skip(self, root), fields(root = %root.display()))]
    pub async fn scan(&self, root_id: RootId, root: &Path) -> Result<FolderSnapshot> {
        let root = open_root(root).await?;
        info!("Scanning {} as {}", root.display(), root_id);

        let options = self.options.clone();
        let walk_root = root.clone();
        let (candidates, mut skipped) =
            tokio::task::spawn_blocking(move || walk(&walk_root, &options))
                .await
                .map_err(|e| Error::other(format!("Directory walk task failed: {}", e)))?;

        for entry in &skipped {
            self.report_skipped(root_id, entry);
        }

        let semaphore = Arc::new(Semaphore::new(self.options.hash_workers.get()));
        let mut tasks = JoinSet::new();

        for candidate in candidates {
            self.reporter.report(ScanEvent::Discovered {
                root_id,
                path: candidate.path.clone(),
            });

            let semaphore = Arc::clone(&semaphore);
            let chunk_size = self.options.chunk_size;
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let outcome = read_record(root_id, &candidate, chunk_size).await;
                (candidate.path, outcome)
            });
        }

        let mut records = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            let (path, outcome) =
                joined.map_err(|e| Error::other(format!("Hashing task failed: {}", e)))?;
            match outcome {
                Ok(mut record) => {
                    record.skip_extraction = self.options.skip_extraction(record.size_bytes);
                    self.reporter.report(ScanEvent::Hashed {
                        root_id,
                        path,
                        size: record.size_bytes,
                    });
                    records.push(record);
                }
                Err(e) => {
                    let entry = SkippedEntry {
                        path,
                        reason: e.to_string(),
                    };
                    self.report_skipped(root_id, &entry);
                    skipped.push(entry);
                }
            }
        }

        skipped.sort_by(|a, b| a.path.cmp(&b.path));

        // A root that vanished while hashing makes every missing record suspect.
        if !is_dir(&root).await {
            let error = Error::root_unavailable(&root, "root disappeared during scan");
            tracing::error!("{}", error);
            return Err(error);
        }

        let snapshot =
            FolderSnapshot::from_records(root_id, root, records).with_skipped(skipped);
        info!(
            "Scanned {} files ({} skipped) under {}",
            snapshot.len(),
            snapshot.skipped().len(),
            snapshot.root().display()
        );
        self.reporter.report(ScanEvent::Completed {
            root_id,
            files: snapshot.len(),
            skipped: snapshot.skipped().len(),
        });

        Ok(snapshot)
    }

    fn report_skipped(&self, root_id: RootId, entry: &SkippedEntry) {
        warn!("Skipping {}: {}", entry.path.display(), entry.reason);
        self.reporter.report(ScanEvent::Skipped {
            root_id,
            path: entry.path.clone(),
            reason: entry.reason.clone(),
        });
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Resolve a root to its canonical form and check it can be listed
async fn open_root(root: &Path) -> Result<PathBuf> {
    let canonical = tokio::fs::canonicalize(root)
        .await
        .map_err(|e| Error::root_unavailable(root, e.to_string()))?;

    if !is_dir(&canonical).await {
        return Err(Error::root_unavailable(root, "not a directory"));
    }

    tokio::fs::read_dir(&canonical)
        .await
        .map_err(|e| Error::root_unavailable(root, e.to_string()))?;

    Ok(canonical)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_string_lossy().starts_with('.')
}

/// Walk `root` collecting admitted regular files.
///
/// Directories are entered at most once per canonical path, so symlink
/// cycles and aliased directories terminate.
fn walk(root: &Path, options: &ScanOptions) -> (Vec<Candidate>, Vec<SkippedEntry>) {
    let mut candidates = Vec::new();
    let mut skipped = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let skip_hidden = options.skip_hidden;

    let walker = WalkDir::new(root)
        .follow_links(options.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| {
            if skip_hidden && is_hidden(entry) {
                return false;
            }
            if !entry.file_type().is_dir() {
                return true;
            }
            match std::fs::canonicalize(entry.path()) {
                Ok(canonical) => visited.insert(canonical),
                Err(_) => true,
            }
        });

    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                if e.loop_ancestor().is_some() {
                    debug!("Symlink cycle cut at {:?}", e.path());
                    continue;
                }
                let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                skipped.push(SkippedEntry {
                    path,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        if !entry.file_type().is_file() || !options.admits_extension(entry.path()) {
            continue;
        }

        match RelativePath::from_root(root, entry.path()) {
            Ok(relative_path) => candidates.push(Candidate {
                path: entry.into_path(),
                relative_path,
            }),
            Err(e) => skipped.push(SkippedEntry {
                path: entry.into_path(),
                reason: e.to_string(),
            }),
        }
    }

    (candidates, skipped)
}

/// Stat and hash one file
async fn read_record(
    root_id: RootId,
    candidate: &Candidate,
    chunk_size: ChunkSize,
) -> Result<FileRecord> {
    let unreadable = |e: std::io::Error| Error::entry_unreadable(&candidate.path, e.to_string());

    let metadata = tokio::fs::metadata(&candidate.path)
        .await
        .map_err(unreadable)?;
    let modified_time = metadata.modified().map_err(unreadable)?;
    let content_hash = hash_file(&candidate.path, chunk_size)
        .await
        .map_err(unreadable)?;

    Ok(FileRecord {
        root_id,
        relative_path: candidate.relative_path.clone(),
        absolute_path: candidate.path.clone(),
        size_bytes: metadata.len(),
        modified_time,
        content_hash,
        skip_extraction: false,
    })
}
