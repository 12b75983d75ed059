//! Job-scoped execution state and the handle callers poll it through

use crate::planner::SyncAction;
use chrono::{DateTime, Utc};
use docsync_types::{Error, Result};
use serde::Serialize;
use std::fmt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Unique identifier for an execution job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new random job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap a caller-chosen UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not started
    Pending,
    /// Actions are being applied
    Running,
    /// Every action was attempted; individual actions may have failed
    Completed,
    /// A root became unavailable and the job stopped
    Failed,
    /// Stopped on request before every action started
    Cancelled,
}

impl JobStatus {
    /// Check if the job is in a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Failure of one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionError {
    /// Position of the action in the plan
    pub index: usize,
    /// The action that failed
    pub action: SyncAction,
    /// Rendered error
    pub message: String,
    /// Underlying error
    pub error: Error,
}

impl ActionError {
    /// Record `error` against the action at `index`
    pub fn new(index: usize, action: SyncAction, error: Error) -> Self {
        Self {
            index,
            action,
            message: error.to_string(),
            error,
        }
    }
}

/// Progress and outcome of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncJobState {
    /// Job identifier
    pub job_id: JobId,
    /// Current status
    pub status: JobStatus,
    /// Actions finished, successfully or not
    pub completed_count: usize,
    /// Actions in the plan
    pub total_count: usize,
    /// Action most recently started
    pub current_item: Option<String>,
    /// Per-action failures in the order they happened
    pub errors: Vec<ActionError>,
    /// Whether the filesystem is left untouched
    pub dry_run: bool,
    /// When execution started
    pub started_at: Option<DateTime<Utc>>,
    /// When execution reached a terminal status
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncJobState {
    /// Fresh state for a plan of `total_count` actions
    pub fn new(job_id: JobId, total_count: usize, dry_run: bool) -> Self {
        Self {
            job_id,
            status: JobStatus::Pending,
            completed_count: 0,
            total_count,
            current_item: None,
            errors: Vec::new(),
            dry_run,
            started_at: None,
            finished_at: None,
        }
    }

    /// Completion percentage
    pub fn percent(&self) -> f64 {
        if self.total_count == 0 {
            100.0
        } else {
            self.completed_count as f64 / self.total_count as f64 * 100.0
        }
    }

    /// Whether any action failed
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Handle to a running job
#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    state: watch::Receiver<SyncJobState>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub(crate) fn new(
        job_id: JobId,
        state: watch::Receiver<SyncJobState>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            job_id,
            state,
            cancel,
            task,
        }
    }

    /// Job identifier
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Snapshot of the current state
    pub fn poll(&self) -> SyncJobState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<SyncJobState> {
        self.state.clone()
    }

    /// Request cooperative cancellation; in-flight actions finish first
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the job task has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job to reach a terminal state
    pub async fn wait(self) -> Result<SyncJobState> {
        self.task
            .await
            .map_err(|e| Error::other(format!("Job {} task failed: {}", self.job_id, e)))?;
        Ok(self.state.borrow().clone())
    }
}
