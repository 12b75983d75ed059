//! Folder reconciliation engine for DocuSync
//!
//! This crate compares two file trees ("roots") and brings them into agreement:
//!
//! - **Snapshotter**: enumerates a root and hashes every file with a streaming digest
//! - **Reconciler**: three-phase path and content matching between two snapshots
//! - **Duplicate Classifier**: content and name duplicate groups over any set of snapshots
//! - **Sync Planner**: turns a reconciliation and a strategy into an ordered action list
//! - **Sync Executor**: applies a plan with hash verification, cancellation and progress polling
//!
//! # Examples
//!
//! ```rust,no_run
//! use docsync_config::Config;
//! use docsync_sync::{JobId, ReconciliationEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = ReconciliationEngine::new(&Config::default());
//! let analysis = engine.analyze("/mnt/laptop/docs", "/mnt/usb/docs").await?;
//! let plan = engine.plan(&analysis);
//! let state = engine.execute(plan, JobId::new()).wait().await?;
//! println!("{}/{} actions, {} errors", state.completed_count, state.total_count, state.errors.len());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod duplicates;
pub mod engine;
pub mod executor;
pub mod hash;
pub mod job;
pub mod planner;
pub mod progress;
pub mod reconcile;
pub mod snapshot;

pub use duplicates::{DuplicateClassifier, DuplicateGroup, GroupKey, GroupingMode};
pub use engine::{Analysis, ReconciliationEngine};
pub use executor::{ExecutorOptions, SyncExecutor};
pub use hash::{hash_bytes, hash_file, ContentHasher};
pub use job::{ActionError, JobHandle, JobId, JobStatus, SyncJobState};
pub use planner::{PlannerOptions, SyncAction, SyncPlan, SyncPlanner, SUSPECTED_RENAME};
pub use progress::{ScanEvent, ScanProgress, ScanReporter};
pub use reconcile::{MatchResult, ReconcileSummary, Reconciler};
pub use snapshot::{FolderSnapshot, ScanOptions, SkippedEntry, Snapshotter};
