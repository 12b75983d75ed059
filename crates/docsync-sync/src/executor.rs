//! Sync plan execution
//!
//! Actions start in plan order on a bounded pool. Every copy is written to a
//! hidden sibling of its destination, re-hashed, and only then renamed into
//! place, so a failed verification leaves the previous destination and the
//! source untouched. Cross-root renames delete their source only after the
//! copy verified.

use crate::hash::hash_file;
use crate::job::{ActionError, JobHandle, JobId, JobStatus, SyncJobState};
use crate::planner::{SyncAction, SyncPlan};
use chrono::Utc;
use docsync_config::Config;
use docsync_types::{ChunkSize, ContentHash, Error, Result, WorkerCount};
use filetime::FileTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Executor settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorOptions {
    /// Actions applied concurrently
    pub workers: WorkerCount,
    /// Read size for copying and verification
    pub chunk_size: ChunkSize,
    /// Walk the plan without touching the filesystem
    pub dry_run: bool,
    /// Give copies the source's modification time
    pub preserve_timestamps: bool,
}

impl ExecutorOptions {
    /// Build options from the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.sync.workers,
            chunk_size: config.scan.chunk_size,
            dry_run: config.sync.dry_run,
            preserve_timestamps: config.sync.preserve_timestamps,
        }
    }

    /// Set dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the pool size
    pub fn with_workers(mut self, workers: WorkerCount) -> Self {
        self.workers = workers;
        self
    }
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Applies [`SyncPlan`]s
#[derive(Debug, Clone, Default)]
pub struct SyncExecutor {
    options: ExecutorOptions,
}

impl SyncExecutor {
    /// Create an executor
    pub fn new(options: ExecutorOptions) -> Self {
        Self { options }
    }

    /// Executor settings
    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Start executing `plan` in the background and return a pollable handle
    pub fn execute(&self, plan: SyncPlan, job_id: JobId) -> JobHandle {
        let cancel = CancellationToken::new();
        let (state, receiver) = watch::channel(SyncJobState::new(
            job_id,
            plan.len(),
            self.options.dry_run,
        ));
        let task = tokio::spawn(drive(
            self.options.clone(),
            plan,
            job_id,
            Arc::new(state),
            cancel.clone(),
        ));
        JobHandle::new(job_id, receiver, cancel, task)
    }

    /// Execute `plan` on the current task until it reaches a terminal state
    pub async fn run(
        &self,
        plan: SyncPlan,
        job_id: JobId,
        cancel: CancellationToken,
    ) -> SyncJobState {
        let (state, _receiver) =
            watch::channel(SyncJobState::new(job_id, plan.len(), self.options.dry_run));
        let state = Arc::new(state);
        drive(self.options.clone(), plan, job_id, Arc::clone(&state), cancel).await;
        let final_state = state.borrow().clone();
        final_state
    }
}

#[tracing::instrument(skip_all, fields(job_id = %job_id))]
async fn drive(
    options: ExecutorOptions,
    plan: SyncPlan,
    job_id: JobId,
    state: Arc<watch::Sender<SyncJobState>>,
    cancel: CancellationToken,
) {
    state.send_modify(|s| {
        s.status = JobStatus::Running;
        s.started_at = Some(Utc::now());
    });
    info!(
        "Executing {} actions{}",
        plan.len(),
        if options.dry_run { " (dry run)" } else { "" }
    );

    let semaphore = Arc::new(Semaphore::new(options.workers.get()));
    let abort = CancellationToken::new();
    let mut in_flight = JoinSet::new();
    let mut busy: HashSet<PathBuf> = HashSet::new();
    let mut cancelled = false;

    for (index, action) in plan.actions().iter().enumerate() {
        let paths = touched_paths(action);
        if paths.iter().any(|p| busy.contains(p)) {
            drain(&mut in_flight).await;
            busy.clear();
        }

        let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
            break;
        };
        if abort.is_cancelled() {
            break;
        }
        if cancel.is_cancelled() {
            cancelled = true;
            break;
        }

        if !options.dry_run {
            if let Some(root) = unavailable_root(action).await {
                let error = Error::root_unavailable(&root, "root is no longer accessible");
                error!("{}", error);
                state.send_modify(|s| s.errors.push(ActionError::new(index, action.clone(), error)));
                abort.cancel();
                break;
            }
        }

        busy.extend(paths);
        state.send_modify(|s| s.current_item = Some(action.to_string()));

        let action = action.clone();
        let options = options.clone();
        let state = Arc::clone(&state);
        let abort = abort.clone();
        in_flight.spawn(async move {
            let _permit = permit;
            let outcome = if options.dry_run || !action.is_mutating() {
                debug!("Would {}", action);
                Ok(())
            } else {
                debug!("{}", action);
                apply(&action, &options).await
            };

            if let Err(e) = outcome {
                let e = escalate(&action, e).await;
                if e.is_fatal() {
                    error!("{}", e);
                    abort.cancel();
                } else {
                    warn!("Action {} failed: {}", index, e);
                }
                state.send_modify(|s| s.errors.push(ActionError::new(index, action, e)));
            }
            state.send_modify(|s| s.completed_count += 1);
        });
    }

    drain(&mut in_flight).await;

    let status = if abort.is_cancelled() {
        JobStatus::Failed
    } else if cancelled {
        JobStatus::Cancelled
    } else {
        JobStatus::Completed
    };
    state.send_modify(|s| {
        s.status = status;
        s.current_item = None;
        s.finished_at = Some(Utc::now());
    });

    let final_state = state.borrow();
    info!(
        "Job finished as {:?}: {}/{} actions, {} errors",
        final_state.status,
        final_state.completed_count,
        final_state.total_count,
        final_state.errors.len()
    );
}

async fn drain(in_flight: &mut JoinSet<()>) {
    while let Some(joined) = in_flight.join_next().await {
        if let Err(e) = joined {
            error!("Action task failed: {}", e);
        }
    }
}

/// Paths an action reads or writes
fn touched_paths(action: &SyncAction) -> Vec<PathBuf> {
    let mut paths = vec![action.source().to_path_buf()];
    if let Some(destination) = action.destination() {
        paths.push(destination.to_path_buf());
    }
    paths
}

/// Roots an action writes into
fn written_roots(action: &SyncAction) -> Vec<&Path> {
    match action {
        SyncAction::Copy {
            destination_root, ..
        } => vec![destination_root],
        SyncAction::Rename {
            source_root,
            destination_root,
            ..
        } => vec![source_root, destination_root],
        SyncAction::Skip { .. } => Vec::new(),
    }
}

async fn unavailable_root(action: &SyncAction) -> Option<PathBuf> {
    for root in written_roots(action) {
        let available = tokio::fs::metadata(root)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !available {
            return Some(root.to_path_buf());
        }
    }
    None
}

/// Promote an action error to a root failure when a root it writes into has gone
async fn escalate(action: &SyncAction, error: Error) -> Error {
    match unavailable_root(action).await {
        Some(root) => Error::root_unavailable(root, error.to_string()),
        None => error,
    }
}

fn io_error(path: &Path) -> impl Fn(std::io::Error) -> Error + '_ {
    move |e| Error::Io {
        message: format!("{}: {}", path.display(), e),
    }
}

async fn apply(action: &SyncAction, options: &ExecutorOptions) -> Result<()> {
    match action {
        SyncAction::Copy {
            source,
            destination,
            content_hash,
            overwrite,
            ..
        } => copy_verified(source, destination, *content_hash, *overwrite, options).await,
        SyncAction::Rename {
            source,
            destination,
            source_root,
            destination_root,
            content_hash,
        } => {
            if source_root == destination_root {
                rename_within_root(source, destination).await
            } else {
                copy_verified(source, destination, *content_hash, false, options).await?;
                tokio::fs::remove_file(source).await.map_err(io_error(source))
            }
        }
        SyncAction::Skip { .. } => Ok(()),
    }
}

async fn ensure_vacant(destination: &Path) -> Result<()> {
    if tokio::fs::try_exists(destination).await.unwrap_or(true) {
        return Err(Error::DestinationExists {
            path: destination.to_path_buf(),
        });
    }
    Ok(())
}

async fn create_parent(destination: &Path) -> Result<()> {
    let parent = destination.parent().ok_or_else(|| {
        Error::invalid_path(format!("{} has no parent", destination.display()))
    })?;
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(io_error(parent))
}

async fn rename_within_root(source: &Path, destination: &Path) -> Result<()> {
    ensure_vacant(destination).await?;
    create_parent(destination).await?;
    tokio::fs::rename(source, destination)
        .await
        .map_err(io_error(source))
}

/// Hidden sibling the copy is staged in
fn staging_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{}.{}.docsync-tmp", name, uuid::Uuid::new_v4().simple()))
}

async fn copy_verified(
    source: &Path,
    destination: &Path,
    expected: ContentHash,
    overwrite: bool,
    options: &ExecutorOptions,
) -> Result<()> {
    if !overwrite {
        ensure_vacant(destination).await?;
    }
    create_parent(destination).await?;

    let staging = staging_path(destination);
    let staged = stage(source, &staging, destination, expected, options).await;
    let placed = match staged {
        Ok(()) => tokio::fs::rename(&staging, destination)
            .await
            .map_err(io_error(destination)),
        Err(e) => Err(e),
    };

    if placed.is_err() {
        let _ = tokio::fs::remove_file(&staging).await;
    }
    placed
}

/// Stream `source` into `staging`, then re-hash the staged bytes
async fn stage(
    source: &Path,
    staging: &Path,
    destination: &Path,
    expected: ContentHash,
    options: &ExecutorOptions,
) -> Result<()> {
    let unreadable = |e: std::io::Error| Error::entry_unreadable(source, e.to_string());

    let mut reader = tokio::fs::File::open(source).await.map_err(unreadable)?;
    let mut writer = tokio::fs::File::create(staging)
        .await
        .map_err(io_error(staging))?;
    let mut buffer = vec![0u8; options.chunk_size.get()];

    loop {
        let read = reader.read(&mut buffer).await.map_err(unreadable)?;
        if read == 0 {
            break;
        }
        writer
            .write_all(&buffer[..read])
            .await
            .map_err(io_error(staging))?;
    }
    writer.flush().await.map_err(io_error(staging))?;
    writer.sync_all().await.map_err(io_error(staging))?;
    drop(writer);

    let actual = hash_file(staging, options.chunk_size)
        .await
        .map_err(io_error(staging))?;
    if actual != expected {
        return Err(Error::VerificationMismatch {
            path: destination.to_path_buf(),
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        });
    }

    if options.preserve_timestamps {
        let metadata = tokio::fs::metadata(source).await.map_err(unreadable)?;
        let mtime = FileTime::from_last_modification_time(&metadata);
        filetime::set_file_mtime(staging, mtime).map_err(io_error(staging))?;
    }

    Ok(())
}
