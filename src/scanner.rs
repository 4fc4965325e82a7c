//! Deep scan of a directory tree on a worker thread.
//!
//! The worker lists every file under the root first, so the total is known
//! before any hashing starts, then records each file and reports through a
//! bounded channel. Consumers drain the channel on whatever thread owns their
//! output; callbacks never run on the worker.

use crate::file_category::FileMapper;
use crate::hasher::ContentHasher;
use crate::record::FileRecord;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum ScanError {
    /// This orchestrator already has a scan in flight.
    #[error("a scan is already running")]
    AlreadyRunning,

    #[error("scan root {} is not a directory", .0.display())]
    RootNotFound(PathBuf),

    #[error("failed to start scan worker: {0}")]
    Spawn(std::io::Error),

    #[error("scan worker panicked")]
    WorkerPanicked,
}

/// Final result of a scan.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub root: PathBuf,
    /// Files found under the root.
    pub total: usize,
    /// Records for every readable file, in traversal order.
    pub records: Vec<FileRecord>,
    /// Files that could not be read.
    pub failures: Vec<(PathBuf, String)>,
}

impl ScanOutcome {
    pub fn total_bytes(&self) -> u64 {
        self.records.iter().map(|record| record.size).sum()
    }
}

/// Messages sent from the scan worker.
#[derive(Debug, Clone)]
pub enum ScanEvent {
    /// Sent once per file, after that file's `Item` or `Failed` event.
    Progress { completed: usize, total: usize },
    Item(FileRecord),
    Failed { path: PathBuf, reason: String },
    /// Always the last event.
    Complete(ScanOutcome),
}

/// A running scan.
#[derive(Debug)]
pub struct ScanHandle {
    events: Receiver<ScanEvent>,
    worker: JoinHandle<()>,
}

impl ScanHandle {
    /// Blocks for the next event; `None` once the worker is done.
    pub fn recv(&self) -> Option<ScanEvent> {
        self.events.recv().ok()
    }

    pub fn try_recv(&self) -> Option<ScanEvent> {
        self.events.try_recv().ok()
    }

    pub fn iter(&self) -> mpsc::Iter<'_, ScanEvent> {
        self.events.iter()
    }

    /// Waits for the worker thread to exit.
    pub fn join(self) -> Result<(), ScanError> {
        drop(self.events);
        self.worker.join().map_err(|_| ScanError::WorkerPanicked)
    }
}

/// Clears the running flag when the worker exits, panics included.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs at most one deep scan at a time.
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    active: Arc<AtomicBool>,
    mapper: FileMapper,
    hasher: ContentHasher,
    channel_capacity: usize,
}

impl Default for ScanOrchestrator {
    fn default() -> Self {
        Self::new(ContentHasher::default(), 256)
    }
}

impl ScanOrchestrator {
    pub fn new(hasher: ContentHasher, channel_capacity: usize) -> Self {
        Self {
            active: Arc::new(AtomicBool::new(false)),
            mapper: FileMapper::default(),
            hasher,
            channel_capacity: channel_capacity.max(1),
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Starts scanning `root` on a worker thread.
    pub fn start(&self, root: &Path) -> Result<ScanHandle, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if self
            .active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ScanError::AlreadyRunning);
        }

        let guard = ActiveGuard(Arc::clone(&self.active));
        let (sender, events) = mpsc::sync_channel(self.channel_capacity);
        let root = root.to_path_buf();
        let mapper = self.mapper;
        let hasher = self.hasher;

        let worker = thread::Builder::new()
            .name("reshelve-scan".to_string())
            .spawn(move || {
                let _guard = guard;
                run_scan(root, &mapper, &hasher, &sender);
            })
            .map_err(ScanError::Spawn)?;

        Ok(ScanHandle { events, worker })
    }

    /// Scans `root`, delivering events to the callbacks on the calling thread.
    ///
    /// `on_progress` runs once per file with `completed` counting up from 1,
    /// `on_item` once per readable file, and `on_complete` once at the end.
    pub fn scan(
        &self,
        root: &Path,
        mut on_progress: impl FnMut(usize, usize),
        mut on_item: impl FnMut(&FileRecord),
        on_complete: impl FnOnce(&ScanOutcome),
    ) -> Result<ScanOutcome, ScanError> {
        let handle = self.start(root)?;
        let mut outcome = None;

        for event in handle.iter() {
            match event {
                ScanEvent::Progress { completed, total } => on_progress(completed, total),
                ScanEvent::Item(record) => on_item(&record),
                ScanEvent::Failed { .. } => {}
                ScanEvent::Complete(result) => outcome = Some(result),
            }
        }
        handle.join()?;

        let outcome = outcome.ok_or(ScanError::WorkerPanicked)?;
        on_complete(&outcome);
        Ok(outcome)
    }
}

fn run_scan(root: PathBuf, mapper: &FileMapper, hasher: &ContentHasher, sender: &SyncSender<ScanEvent>) {
    let files: Vec<PathBuf> = WalkDir::new(&root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_file() => Some(entry.into_path()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .collect();

    let total = files.len();
    info!(root = %root.display(), total, "deep scan started");
    let mut outcome = ScanOutcome {
        root,
        total,
        ..Default::default()
    };

    for (index, path) in files.into_iter().enumerate() {
        let event = match FileRecord::from_path(&path, mapper, hasher) {
            Ok(record) => {
                outcome.records.push(record.clone());
                ScanEvent::Item(record)
            }
            Err(e) => {
                warn!(error = %e, "skipping file");
                let reason = e.to_string();
                outcome.failures.push((path.clone(), reason.clone()));
                ScanEvent::Failed { path, reason }
            }
        };

        let progress = ScanEvent::Progress {
            completed: index + 1,
            total,
        };
        if sender.send(event).is_err() || sender.send(progress).is_err() {
            debug!("scan consumer hung up");
            return;
        }
    }

    info!(
        scanned = outcome.records.len(),
        failed = outcome.failures.len(),
        "deep scan finished"
    );
    let _ = sender.send(ScanEvent::Complete(outcome));
}
