//! One working session: the selected sources, the target, and both undo
//! histories, wired to the configured engines.

use crate::config::{CompiledFilters, Config, ConfigError};
use crate::duplicates::{DuplicateDetector, DuplicateReport};
use crate::file_organizer::{
    FileOrganizer, OrganizeOptions, OrganizeResult, OrganizeSummary, PlannedMove,
};
use crate::hasher::ContentHasher;
use crate::record::FileRecord;
use crate::registry::PathRegistry;
use crate::relocator::{self, RelocateError};
use crate::scanner::{ScanError, ScanOrchestrator, ScanOutcome};
use crate::undo::{LedgerResult, SessionOperation, SessionUndoStack, UndoLedger, UndoOutcome};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no target folder set")]
    NoTarget,

    #[error(transparent)]
    Relocate(#[from] RelocateError),
}

#[derive(Debug)]
pub struct Session {
    registry: PathRegistry,
    target: Option<PathBuf>,
    filters: CompiledFilters,
    organizer: FileOrganizer,
    detector: DuplicateDetector,
    scanner: ScanOrchestrator,
    ledger: UndoLedger,
    history: SessionUndoStack,
}

impl Session {
    /// Builds a session from `config`, compiling its filters.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let hasher = ContentHasher::new(config.scan.block_size);
        Ok(Self {
            registry: PathRegistry::new(),
            target: None,
            filters: config.compile_filters()?,
            organizer: FileOrganizer::new(OrganizeOptions {
                group_by_category: config.organize.group_by_category,
            }),
            detector: DuplicateDetector::new(hasher),
            scanner: ScanOrchestrator::new(hasher, config.scan.channel_capacity),
            ledger: UndoLedger::new(&config.organize.ledger_file),
            history: SessionUndoStack::new(),
        })
    }

    /// Persists undo batches at `path` instead of the configured location.
    pub fn with_ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.ledger = UndoLedger::new(path);
        self
    }

    pub fn set_group_by_category(&mut self, group_by_category: bool) {
        self.organizer = FileOrganizer::new(OrganizeOptions { group_by_category });
    }

    pub fn add_source(&mut self, path: impl AsRef<Path>) -> bool {
        self.registry.add(path)
    }

    pub fn remove_source(&mut self, path: impl AsRef<Path>) -> bool {
        self.registry.remove(path)
    }

    pub fn clear_sources(&mut self) {
        self.registry.clear();
    }

    pub fn sources(&self) -> &PathRegistry {
        &self.registry
    }

    pub fn set_target(&mut self, path: impl Into<PathBuf>) {
        self.target = Some(path.into());
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    pub fn ledger(&self) -> &UndoLedger {
        &self.ledger
    }

    pub fn history(&self) -> &SessionUndoStack {
        &self.history
    }

    pub fn scanner(&self) -> &ScanOrchestrator {
        &self.scanner
    }

    /// Where organize would put each file right now.
    pub fn preview(&self) -> OrganizeResult<Vec<PlannedMove>> {
        self.organizer
            .plan(&self.registry, self.target(), Some(&self.filters))
    }

    /// Organizes the sources into the target, replacing the undo batch.
    pub fn organize(&mut self) -> OrganizeResult<OrganizeSummary> {
        self.organizer.organize(
            &self.registry,
            self.target.as_deref(),
            Some(&self.filters),
            &mut self.ledger,
        )
    }

    pub fn find_duplicates(&self) -> DuplicateReport {
        self.detector
            .find_duplicates(&self.registry, Some(&self.filters))
    }

    /// Deep-scans `root`; see [`ScanOrchestrator::scan`].
    pub fn deep_scan(
        &self,
        root: &Path,
        on_progress: impl FnMut(usize, usize),
        on_item: impl FnMut(&FileRecord),
        on_complete: impl FnOnce(&ScanOutcome),
    ) -> Result<ScanOutcome, ScanError> {
        self.scanner.scan(root, on_progress, on_item, on_complete)
    }

    /// Reverses the last organize batch.
    pub fn undo(&mut self) -> LedgerResult<UndoOutcome> {
        self.ledger.undo_batch()
    }

    /// Reverses the most recent single move or copy.
    pub fn undo_last(&mut self) -> Result<Option<SessionOperation>, RelocateError> {
        self.history.undo_last()
    }

    /// Moves one file into the target folder and remembers how to put it back.
    pub fn move_into_target(&mut self, source: &Path) -> Result<PathBuf, SessionError> {
        let target = self.target.as_deref().ok_or(SessionError::NoTarget)?;
        let destination = relocator::relocate(source, target)?;
        info!(from = %source.display(), to = %destination.display(), "moved file");
        self.history.push(SessionOperation::Move {
            after: destination.clone(),
            before: source.to_path_buf(),
        });
        Ok(destination)
    }

    /// Copies one file into `destination_dir`; undoing deletes the copy.
    pub fn copy_into(
        &mut self,
        source: &Path,
        destination_dir: &Path,
    ) -> Result<PathBuf, RelocateError> {
        let created = relocator::copy_into(source, destination_dir)?;
        info!(from = %source.display(), to = %created.display(), "copied file");
        self.history.push(SessionOperation::Copy {
            created: created.clone(),
        });
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn session_in(temp_dir: &TempDir) -> Session {
        Session::new(&Config::default())
            .unwrap()
            .with_ledger_path(temp_dir.path().join("ledger.json"))
    }

    #[test]
    fn test_move_then_undo_last() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("note.txt");
        fs::write(&file, "hi").unwrap();
        let out = temp_dir.path().join("out");
        fs::create_dir(&out).unwrap();

        let mut session = session_in(&temp_dir);
        assert!(matches!(
            session.move_into_target(&file),
            Err(SessionError::NoTarget)
        ));

        session.set_target(&out);
        let moved = session.move_into_target(&file).unwrap();
        assert_eq!(moved, out.join("note.txt"));
        assert_eq!(session.history().len(), 1);

        session.undo_last().unwrap();
        assert!(file.exists());
        assert!(!moved.exists());
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_copy_then_undo_last_removes_copy() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let file = temp_dir.path().join("photo.jpg");
        fs::write(&file, "jpg").unwrap();
        let backup = temp_dir.path().join("backup");

        let mut session = session_in(&temp_dir);
        let created = session.copy_into(&file, &backup).unwrap();
        assert!(created.exists());

        let undone = session.undo_last().unwrap();
        assert!(matches!(undone, Some(SessionOperation::Copy { .. })));
        assert!(!created.exists());
        assert!(file.exists());
        assert_eq!(session.undo_last().unwrap(), None);
    }

    #[test]
    fn test_organize_and_undo_through_session() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let inbox = temp_dir.path().join("inbox");
        fs::create_dir(&inbox).unwrap();
        fs::write(inbox.join("a.pdf"), "a").unwrap();

        let mut session = session_in(&temp_dir);
        session.add_source(&inbox);
        session.set_target(temp_dir.path().join("out"));

        let summary = session.organize().unwrap();
        assert_eq!(summary.moved(), 1);
        assert!(session.ledger().has_batch());

        let outcome = session.undo().unwrap();
        assert!(matches!(outcome, UndoOutcome::Undone(ref r) if r.restored_files == 1));
        assert!(inbox.join("a.pdf").exists());
        assert!(!session.ledger().has_batch());
    }
}
