//! The organize pipeline.
//!
//! Files expanded from the registry are classified, moved into
//! `<target>/<Category>/` by the relocator, and every successful move is
//! appended to the undo ledger. One bad file never aborts the batch: it is
//! logged, counted and skipped. Missing preconditions are rejected before
//! anything on disk changes.

use crate::config::CompiledFilters;
use crate::file_category::{Category, FileMapper};
use crate::registry::{PathRegistry, canonicalize_lenient};
use crate::relocator::{self, RelocateError};
use crate::undo::{LedgerError, RelocationRecord, UndoLedger};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Errors that stop an organize run as a whole.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("no source files or folders selected")]
    NoSourcesConfigured,

    #[error("no target folder set")]
    NoTargetConfigured,

    /// The target could not be created or is not a directory.
    #[error("cannot use target folder {}: {source}", path.display())]
    TargetUnusable {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Files were moved but the undo batch could not be saved.
    #[error("moved {moved} files but could not save undo history: {source}")]
    LedgerWrite { moved: usize, source: LedgerError },
}

/// Result type for organize runs.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// How files are laid out under the target.
#[derive(Debug, Clone, Copy)]
pub struct OrganizeOptions {
    /// One subfolder per category; otherwise straight into the target.
    pub group_by_category: bool,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            group_by_category: true,
        }
    }
}

/// One file's place in a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub category: Category,
    /// Where the file would land, collisions included.
    pub destination: PathBuf,
}

/// What an organize run did.
#[derive(Debug, Default)]
pub struct OrganizeSummary {
    /// Every move made, in order.
    pub moves: Vec<RelocationRecord>,
    /// Moved files per category.
    pub by_category: BTreeMap<Category, usize>,
    /// Files left alone: vanished, or already in place.
    pub skipped: Vec<(PathBuf, String)>,
    /// Files that could not be moved.
    pub failed: Vec<(PathBuf, String)>,
    /// Registered sources that no longer exist.
    pub missing_sources: Vec<PathBuf>,
    /// Files dropped by filter rules.
    pub filtered: usize,
}

impl OrganizeSummary {
    pub fn moved(&self) -> usize {
        self.moves.len()
    }

    pub fn processed(&self) -> usize {
        self.moved() + self.skipped.len() + self.failed.len()
    }
}

/// Moves files into category directories.
#[derive(Debug, Default, Clone)]
pub struct FileOrganizer {
    mapper: FileMapper,
    options: OrganizeOptions,
}

impl FileOrganizer {
    pub fn new(options: OrganizeOptions) -> Self {
        Self {
            mapper: FileMapper::default(),
            options,
        }
    }

    /// The directory a file of `category` goes to under `target`.
    pub fn destination_dir(&self, target: &Path, category: Category) -> PathBuf {
        if self.options.group_by_category {
            target.join(category.dir_name())
        } else {
            target.to_path_buf()
        }
    }

    fn check_preconditions<'a>(
        registry: &PathRegistry,
        target: Option<&'a Path>,
    ) -> OrganizeResult<&'a Path> {
        let target = target.ok_or(OrganizeError::NoTargetConfigured)?;
        if registry.is_empty() {
            return Err(OrganizeError::NoSourcesConfigured);
        }
        Ok(target)
    }

    /// Works out where every file would go without touching the filesystem.
    pub fn plan(
        &self,
        registry: &PathRegistry,
        target: Option<&Path>,
        filters: Option<&CompiledFilters>,
    ) -> OrganizeResult<Vec<PlannedMove>> {
        let target = canonicalize_lenient(Self::check_preconditions(registry, target)?);
        let target = target.as_path();
        let mut reserved: HashSet<PathBuf> = HashSet::new();
        let mut plan = Vec::new();

        for source in registry.expand(filters).files {
            let category = self.mapper.classify_entry(&source, false);
            let dir = self.destination_dir(target, category);
            let Some(file_name) = source.file_name() else {
                continue;
            };
            if source.parent() == Some(dir.as_path()) {
                continue;
            }

            let destination = relocator::unique_destination_with(&dir, file_name, |candidate| {
                reserved.contains(candidate) || relocator::exists_no_follow(candidate)
            });
            reserved.insert(destination.clone());
            plan.push(PlannedMove {
                source,
                category,
                destination,
            });
        }

        Ok(plan)
    }

    /// Organizes every registered file into `target` and commits the undo batch.
    pub fn organize(
        &self,
        registry: &PathRegistry,
        target: Option<&Path>,
        filters: Option<&CompiledFilters>,
        ledger: &mut UndoLedger,
    ) -> OrganizeResult<OrganizeSummary> {
        let target = Self::check_preconditions(registry, target)?;

        if target.exists() && !target.is_dir() {
            return Err(OrganizeError::TargetUnusable {
                path: target.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    "target is not a directory",
                ),
            });
        }
        fs::create_dir_all(target).map_err(|e| OrganizeError::TargetUnusable {
            path: target.to_path_buf(),
            source: e,
        })?;
        let target = canonicalize_lenient(target);
        let target = target.as_path();

        let expansion = registry.expand(filters);
        let mut summary = OrganizeSummary {
            missing_sources: expansion.missing,
            filtered: expansion.filtered,
            ..Default::default()
        };

        ledger.begin_batch();
        for source in expansion.files {
            let category = self.mapper.classify_entry(&source, false);
            let dir = self.destination_dir(target, category);

            if source.parent() == Some(dir.as_path()) {
                summary
                    .skipped
                    .push((source, "already in place".to_string()));
                continue;
            }

            match relocator::relocate(&source, &dir) {
                Ok(destination) => {
                    ledger.record(&destination, &source);
                    *summary.by_category.entry(category).or_insert(0) += 1;
                    summary.moves.push(RelocationRecord {
                        destination,
                        original: source,
                    });
                }
                Err(RelocateError::SourceNotFound(path)) => {
                    warn!(path = %path.display(), "file vanished before it could be moved");
                    summary.skipped.push((path, "file not found".to_string()));
                }
                Err(e) => {
                    warn!(path = %source.display(), error = %e, "failed to move file");
                    summary.failed.push((source, e.to_string()));
                }
            }
        }

        ledger
            .commit_batch()
            .map_err(|source| OrganizeError::LedgerWrite {
                moved: summary.moved(),
                source,
            })?;

        info!(
            moved = summary.moved(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            target = %target.display(),
            "organize finished"
        );
        Ok(summary)
    }
}
