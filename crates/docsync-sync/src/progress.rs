//! Progress reporting for folder scans

use docsync_types::{FileSize, RootId};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

/// Event emitted while a root is being scanned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A regular file passed the filters and was queued for hashing
    Discovered {
        /// Root being scanned
        root_id: RootId,
        /// Absolute path of the file
        path: PathBuf,
    },
    /// A file's digest was computed
    Hashed {
        /// Root being scanned
        root_id: RootId,
        /// Absolute path of the file
        path: PathBuf,
        /// Bytes streamed through the digest
        size: FileSize,
    },
    /// An entry could not be read and was left out of the snapshot
    Skipped {
        /// Root being scanned
        root_id: RootId,
        /// Path of the entry
        path: PathBuf,
        /// Reason the entry was skipped
        reason: String,
    },
    /// The scan of a root finished
    Completed {
        /// Root that was scanned
        root_id: RootId,
        /// Files recorded in the snapshot
        files: usize,
        /// Entries skipped
        skipped: usize,
    },
}

/// Aggregated counters of one or more concurrent scans
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanProgress {
    /// Files queued for hashing
    pub files_discovered: u64,
    /// Files hashed
    pub files_hashed: u64,
    /// Entries skipped
    pub files_skipped: u64,
    /// Bytes streamed through the digest
    pub bytes_hashed: u64,
    /// File most recently hashed
    pub current_file: Option<PathBuf>,
    /// Roots whose scan has completed
    pub roots_completed: u32,
    /// Time spent scanning
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ScanProgress {
    /// Percentage of discovered files already hashed or skipped
    pub fn percent(&self) -> f64 {
        if self.files_discovered == 0 {
            0.0
        } else {
            let done = self.files_hashed + self.files_skipped;
            (done as f64 / self.files_discovered as f64 * 100.0).min(100.0)
        }
    }

    /// Hashing throughput in bytes per second
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes_hashed as f64 / secs
        } else {
            0.0
        }
    }
}

/// Fan-out point for scan events: updates the pollable [`ScanProgress`] and
/// forwards each event to an optional subscriber channel.
#[derive(Debug, Clone)]
pub struct ScanReporter {
    progress: Arc<watch::Sender<ScanProgress>>,
    events: Option<mpsc::UnboundedSender<ScanEvent>>,
    started: Instant,
}

impl ScanReporter {
    /// Create a reporter without an event subscriber
    pub fn new() -> Self {
        let (progress, _) = watch::channel(ScanProgress::default());
        Self {
            progress: Arc::new(progress),
            events: None,
            started: Instant::now(),
        }
    }

    /// Forward every event to `sender`
    pub fn with_events(mut self, sender: mpsc::UnboundedSender<ScanEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Subscribe to progress snapshots
    pub fn subscribe(&self) -> watch::Receiver<ScanProgress> {
        self.progress.subscribe()
    }

    /// Current progress snapshot
    pub fn snapshot(&self) -> ScanProgress {
        self.progress.borrow().clone()
    }

    /// Record an event
    pub fn report(&self, event: ScanEvent) {
        let elapsed = self.started.elapsed();
        self.progress.send_modify(|progress| {
            progress.elapsed = elapsed;
            match &event {
                ScanEvent::Discovered { .. } => progress.files_discovered += 1,
                ScanEvent::Hashed { path, size, .. } => {
                    progress.files_hashed += 1;
                    progress.bytes_hashed += size;
                    progress.current_file = Some(path.clone());
                }
                ScanEvent::Skipped { .. } => progress.files_skipped += 1,
                ScanEvent::Completed { .. } => progress.roots_completed += 1,
            }
        });

        if let Some(events) = &self.events {
            // The subscriber may have gone away; progress is still tracked.
            let _ = events.send(event);
        }
    }
}

impl Default for ScanReporter {
    fn default() -> Self {
        Self::new()
    }
}
