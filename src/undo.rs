//! Undo support for relocations.
//!
//! Two mechanisms live here. [`UndoLedger`] records every move of one
//! organize batch and persists it to disk, so the whole batch can be reversed
//! later, possibly from another process. [`SessionUndoStack`] is an in-memory
//! LIFO of individual move/copy operations made outside a batch; it never
//! touches the ledger file.

use crate::relocator::{self, RelocateError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default ledger file name, resolved against the working directory.
pub const DEFAULT_LEDGER_FILE: &str = ".reshelve_undo.json";

/// One successful move: where the file is now and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelocationRecord {
    /// The path of the file after the move.
    pub destination: PathBuf,
    /// The path of the file before the move.
    pub original: PathBuf,
}

/// Errors raised by the persisted ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger file exists but cannot be parsed. Nothing has been moved.
    #[error("undo ledger {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to access undo ledger {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// What undoing a batch did.
#[derive(Debug, Default)]
pub struct UndoReport {
    /// Number of files successfully restored.
    pub restored_files: usize,
    /// Files restored next to an occupied original path: (original, actual).
    pub renamed_restores: Vec<(PathBuf, PathBuf)>,
    /// Files that failed to restore; their records stay in the ledger.
    pub failed_restores: Vec<(PathBuf, String)>,
    /// Files no longer present at their recorded destination.
    pub skipped_files: Vec<(PathBuf, String)>,
}

impl UndoReport {
    /// Returns the total number of records processed.
    pub fn total_processed(&self) -> usize {
        self.restored_files + self.failed_restores.len() + self.skipped_files.len()
    }

    /// Returns true if every record was restored.
    pub fn is_complete_success(&self) -> bool {
        self.failed_restores.is_empty() && self.skipped_files.is_empty()
    }
}

/// Outcome of [`UndoLedger::undo_batch`].
#[derive(Debug)]
pub enum UndoOutcome {
    /// No persisted batch existed, or it held no records.
    NothingToUndo,
    /// A batch was replayed.
    Undone(UndoReport),
}

/// Ordered record of one organize batch, persisted as a JSON array.
#[derive(Debug)]
pub struct UndoLedger {
    path: PathBuf,
    pending: Vec<RelocationRecord>,
}

impl UndoLedger {
    /// Creates a ledger backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pending: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Starts a fresh in-memory batch, discarding anything uncommitted.
    pub fn begin_batch(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                dropped = self.pending.len(),
                "discarding uncommitted undo records"
            );
        }
        self.pending.clear();
    }

    /// Appends one move to the current batch.
    pub fn record(&mut self, destination: impl Into<PathBuf>, original: impl Into<PathBuf>) {
        self.pending.push(RelocationRecord {
            destination: destination.into(),
            original: original.into(),
        });
    }

    /// Records of the batch in progress.
    pub fn pending(&self) -> &[RelocationRecord] {
        &self.pending
    }

    /// Persists the current batch, replacing any earlier one.
    ///
    /// An empty batch is not written, so a run that moved nothing leaves the
    /// previous batch undoable. Returns the number of records persisted.
    pub fn commit_batch(&mut self) -> LedgerResult<usize> {
        let records = std::mem::take(&mut self.pending);
        if records.is_empty() {
            debug!("empty batch, ledger left untouched");
            return Ok(0);
        }
        self.write(&records)?;
        info!(records = records.len(), ledger = %self.path.display(), "undo batch committed");
        Ok(records.len())
    }

    /// Returns true if a persisted batch exists.
    pub fn has_batch(&self) -> bool {
        self.path.exists()
    }

    /// Reads the persisted batch without consuming it.
    pub fn load(&self) -> LedgerResult<Option<Vec<RelocationRecord>>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LedgerError::Io {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| LedgerError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Reverses the persisted batch, newest record first.
    ///
    /// The ledger is parsed in full before any file moves, so a corrupt ledger
    /// leaves the filesystem untouched. Records that fail for reasons other
    /// than a vanished file are written back so the undo can be retried;
    /// otherwise the ledger file is deleted.
    pub fn undo_batch(&mut self) -> LedgerResult<UndoOutcome> {
        let records = match self.load()? {
            Some(records) if !records.is_empty() => records,
            Some(_) => {
                self.delete()?;
                return Ok(UndoOutcome::NothingToUndo);
            }
            None => return Ok(UndoOutcome::NothingToUndo),
        };

        let mut report = UndoReport::default();
        let mut retained = Vec::new();

        for record in records.iter().rev() {
            match relocator::restore(&record.destination, &record.original) {
                Ok(restored_to) => {
                    report.restored_files += 1;
                    if restored_to != record.original {
                        warn!(
                            original = %record.original.display(),
                            restored = %restored_to.display(),
                            "original path occupied, restored beside it"
                        );
                        report
                            .renamed_restores
                            .push((record.original.clone(), restored_to));
                    }
                }
                Err(RelocateError::SourceNotFound(path)) => {
                    report
                        .skipped_files
                        .push((path, "file not found at recorded location".to_string()));
                }
                Err(e) => {
                    warn!(error = %e, "failed to restore file");
                    report
                        .failed_restores
                        .push((record.destination.clone(), e.to_string()));
                    retained.push(record.clone());
                }
            }
        }

        if retained.is_empty() {
            self.delete()?;
        } else {
            retained.reverse();
            self.write(&retained)?;
        }

        info!(
            restored = report.restored_files,
            skipped = report.skipped_files.len(),
            failed = report.failed_restores.len(),
            "undo batch replayed"
        );
        Ok(UndoOutcome::Undone(report))
    }

    fn write(&self, records: &[RelocationRecord]) -> LedgerResult<()> {
        let io_err = |source| LedgerError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(records).map_err(|e| LedgerError::Io {
            path: self.path.clone(),
            source: io::Error::new(io::ErrorKind::InvalidData, e),
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }

    fn delete(&self) -> LedgerResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LedgerError::Io {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

/// A single reversible operation made outside a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOperation {
    /// A file moved from `before` to `after`; reversed by moving it back.
    Move { after: PathBuf, before: PathBuf },
    /// A copy created at `created`; reversed by deleting it.
    Copy { created: PathBuf },
}

/// LIFO stack of session operations. Each undo consumes exactly one entry.
#[derive(Debug, Default)]
pub struct SessionUndoStack {
    operations: Vec<SessionOperation>,
}

impl SessionUndoStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: SessionOperation) {
        self.operations.push(operation);
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn peek(&self) -> Option<&SessionOperation> {
        self.operations.last()
    }

    /// Pops and reverses the most recent operation.
    ///
    /// Returns `Ok(None)` when the stack is empty. The entry is consumed even
    /// when reversing it fails.
    pub fn undo_last(&mut self) -> Result<Option<SessionOperation>, RelocateError> {
        let Some(operation) = self.operations.pop() else {
            return Ok(None);
        };

        match &operation {
            SessionOperation::Move { after, before } => {
                relocator::restore(after, before)?;
            }
            SessionOperation::Copy { created } => match fs::remove_file(created) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(path = %created.display(), "copy already gone");
                }
                Err(e) => return Err(RelocateError::from_io(e, created, created)),
            },
        }

        Ok(Some(operation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relocator::relocate;
    use tempfile::TempDir;

    fn ledger_in(dir: &Path) -> UndoLedger {
        UndoLedger::new(dir.join(DEFAULT_LEDGER_FILE))
    }

    #[test]
    fn test_undo_no_history() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut ledger = ledger_in(temp_dir.path());

        let outcome = ledger.undo_batch().expect("Undo failed");
        assert!(matches!(outcome, UndoOutcome::NothingToUndo));
    }

    #[test]
    fn test_undo_single_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let file_path = base_path.join("test.txt");
        fs::write(&file_path, "test content").expect("Failed to write test file");

        let mut ledger = ledger_in(base_path);
        ledger.begin_batch();
        let moved = relocate(&file_path, &base_path.join("Documents")).unwrap();
        ledger.record(&moved, &file_path);
        assert_eq!(ledger.commit_batch().unwrap(), 1);
        assert!(ledger.has_batch());

        let UndoOutcome::Undone(report) = ledger.undo_batch().expect("Undo failed") else {
            panic!("expected an undone batch");
        };

        assert_eq!(report.restored_files, 1);
        assert!(report.is_complete_success());
        assert!(file_path.exists());
        assert!(!moved.exists());
        assert!(!ledger.has_batch());
    }

    #[test]
    fn test_undo_replays_in_reverse_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let original = base_path.join("a.txt");
        fs::write(&original, "a").unwrap();

        // Two chained moves of the same file: only reverse order restores it.
        let mut ledger = ledger_in(base_path);
        ledger.begin_batch();
        let first = relocate(&original, &base_path.join("one")).unwrap();
        ledger.record(&first, &original);
        let second = relocate(&first, &base_path.join("two")).unwrap();
        ledger.record(&second, &first);
        ledger.commit_batch().unwrap();

        let UndoOutcome::Undone(report) = ledger.undo_batch().unwrap() else {
            panic!("expected an undone batch");
        };
        assert_eq!(report.restored_files, 2);
        assert_eq!(fs::read_to_string(&original).unwrap(), "a");
        assert!(!first.exists());
        assert!(!second.exists());
    }

    #[test]
    fn test_undo_with_missing_file_is_skipped() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();

        let mut ledger = ledger_in(base_path);
        ledger.begin_batch();
        ledger.record(
            base_path.join("Documents/nonexistent.txt"),
            base_path.join("nonexistent.txt"),
        );
        ledger.commit_batch().unwrap();

        let UndoOutcome::Undone(report) = ledger.undo_batch().unwrap() else {
            panic!("expected an undone batch");
        };
        assert_eq!(report.restored_files, 0);
        assert_eq!(report.skipped_files.len(), 1);
        assert!(!ledger.has_batch());
    }

    #[test]
    fn test_undo_with_occupied_original_keeps_both() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let file_path = base_path.join("test.txt");
        fs::write(&file_path, "original content").unwrap();

        let mut ledger = ledger_in(base_path);
        ledger.begin_batch();
        let moved = relocate(&file_path, &base_path.join("Documents")).unwrap();
        ledger.record(&moved, &file_path);
        ledger.commit_batch().unwrap();

        fs::write(&file_path, "new content").unwrap();

        let UndoOutcome::Undone(report) = ledger.undo_batch().unwrap() else {
            panic!("expected an undone batch");
        };
        assert_eq!(report.restored_files, 1);
        assert_eq!(report.renamed_restores.len(), 1);
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
        assert_eq!(
            fs::read_to_string(base_path.join("test(1).txt")).unwrap(),
            "original content"
        );
    }

    #[test]
    fn test_corrupt_ledger_aborts_without_moving() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();
        let moved = base_path.join("Documents/a.txt");
        fs::create_dir_all(moved.parent().unwrap()).unwrap();
        fs::write(&moved, "a").unwrap();

        let mut ledger = ledger_in(base_path);
        fs::write(ledger.path(), "{ not json").unwrap();

        let result = ledger.undo_batch();
        assert!(matches!(result, Err(LedgerError::Corrupt { .. })));
        assert!(moved.exists());
        assert!(ledger.has_batch());
    }

    #[test]
    fn test_empty_commit_keeps_previous_batch() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut ledger = ledger_in(temp_dir.path());

        ledger.begin_batch();
        ledger.record("/after", "/before");
        ledger.commit_batch().unwrap();

        ledger.begin_batch();
        assert_eq!(ledger.commit_batch().unwrap(), 0);

        let records = ledger.load().unwrap().unwrap();
        assert_eq!(
            records,
            vec![RelocationRecord {
                destination: PathBuf::from("/after"),
                original: PathBuf::from("/before"),
            }]
        );
    }

    #[test]
    fn test_session_stack_undoes_one_entry_at_a_time() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base_path = temp_dir.path();

        let source = base_path.join("a.txt");
        fs::write(&source, "a").unwrap();
        let moved = relocate(&source, &base_path.join("target")).unwrap();
        let copied = relocator::copy_into(&moved, &base_path.join("uploads")).unwrap();

        let mut stack = SessionUndoStack::new();
        stack.push(SessionOperation::Move {
            after: moved.clone(),
            before: source.clone(),
        });
        stack.push(SessionOperation::Copy {
            created: copied.clone(),
        });

        let undone = stack.undo_last().unwrap();
        assert!(matches!(undone, Some(SessionOperation::Copy { .. })));
        assert!(!copied.exists());
        assert!(moved.exists());
        assert_eq!(stack.len(), 1);

        let undone = stack.undo_last().unwrap();
        assert!(matches!(undone, Some(SessionOperation::Move { .. })));
        assert!(source.exists());

        assert!(stack.undo_last().unwrap().is_none());
    }

    #[test]
    fn test_session_stack_leaves_ledger_alone() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut ledger = ledger_in(temp_dir.path());
        ledger.record("/after", "/before");
        ledger.commit_batch().unwrap();

        let created = temp_dir.path().join("copy.txt");
        fs::write(&created, "c").unwrap();
        let mut stack = SessionUndoStack::new();
        stack.push(SessionOperation::Copy { created });
        stack.undo_last().unwrap();

        assert!(ledger.has_batch());
    }
}
