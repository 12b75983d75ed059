//! End-to-end reconciliation engine
//!
//! Wires the snapshotter, reconciler, planner and executor together with
//! settings taken from one [`Config`].

use crate::duplicates::{DuplicateClassifier, DuplicateGroup, GroupingMode};
use crate::executor::{ExecutorOptions, SyncExecutor};
use crate::job::{JobHandle, JobId};
use crate::planner::{PlannerOptions, SyncPlan, SyncPlanner};
use crate::progress::ScanReporter;
use crate::reconcile::{MatchResult, ReconcileSummary, Reconciler};
use crate::snapshot::{FolderSnapshot, ScanOptions, Snapshotter};
use docsync_config::Config;
use docsync_types::{format_bytes, Result};
use std::path::Path;
use tracing::info;

/// Snapshots of two roots and their reconciliation
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Snapshot of root 1
    pub root1: FolderSnapshot,
    /// Snapshot of root 2
    pub root2: FolderSnapshot,
    /// Reconciler output
    pub matches: Vec<MatchResult>,
    /// Counts over `matches`
    pub summary: ReconcileSummary,
}

/// Scan, reconcile, plan and execute with one set of settings
#[derive(Debug, Clone, Default)]
pub struct ReconciliationEngine {
    snapshotter: Snapshotter,
    planner: SyncPlanner,
    executor: SyncExecutor,
}

impl ReconciliationEngine {
    /// Create an engine from the configuration
    pub fn new(config: &Config) -> Self {
        Self {
            snapshotter: Snapshotter::new(ScanOptions::from_config(&config.scan)),
            planner: SyncPlanner::new(PlannerOptions::from_config(&config.sync)),
            executor: SyncExecutor::new(ExecutorOptions::from_config(config)),
        }
    }

    /// Replace the planner settings
    pub fn with_planner_options(mut self, options: PlannerOptions) -> Self {
        self.planner = SyncPlanner::new(options);
        self
    }

    /// Replace the executor settings
    pub fn with_executor_options(mut self, options: ExecutorOptions) -> Self {
        self.executor = SyncExecutor::new(options);
        self
    }

    /// Route scan progress through `reporter`
    pub fn with_reporter(mut self, reporter: ScanReporter) -> Self {
        self.snapshotter = self.snapshotter.with_reporter(reporter);
        self
    }

    /// Scan both roots and reconcile them
    pub async fn analyze(&self, root1: impl AsRef<Path>, root2: impl AsRef<Path>) -> Result<Analysis> {
        let (root1, root2) = self.snapshotter.scan_pair(root1, root2).await?;
        let matches = Reconciler::reconcile(&root1, &root2);
        let summary = ReconcileSummary::from_matches(&matches);

        info!(
            "Reconciled: {} exact, {} partial, {}/{} unique, {} suspected; needs {} on root1, {} on root2",
            summary.exact,
            summary.partial_records,
            summary.unique_to_root1,
            summary.unique_to_root2,
            summary.suspected_pairs,
            format_bytes(summary.space_needed_root1),
            format_bytes(summary.space_needed_root2)
        );

        Ok(Analysis {
            root1,
            root2,
            matches,
            summary,
        })
    }

    /// Plan the sync of an analysis
    pub fn plan(&self, analysis: &Analysis) -> SyncPlan {
        self.planner
            .plan(&analysis.root1, &analysis.root2, &analysis.matches)
    }

    /// Duplicate groups across both roots of an analysis
    pub fn duplicates(&self, analysis: &Analysis, mode: GroupingMode) -> Vec<DuplicateGroup> {
        DuplicateClassifier::classify([&analysis.root1, &analysis.root2], mode)
    }

    /// Start executing a plan
    pub fn execute(&self, plan: SyncPlan, job_id: JobId) -> JobHandle {
        self.executor.execute(plan, job_id)
    }

    /// Planner in use
    pub fn planner(&self) -> &SyncPlanner {
        &self.planner
    }

    /// Snapshotter in use
    pub fn snapshotter(&self) -> &Snapshotter {
        &self.snapshotter
    }
}
