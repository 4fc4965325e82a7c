//! The working set of source paths.
//!
//! Paths are canonicalized on insertion so that `./a/../b.txt` and
//! `/abs/b.txt` are the same entry. Existence is not required: a path that
//! cannot be resolved is normalized lexically and checked again when used.

use crate::config::CompiledFilters;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Whether a registered source was a file or a directory when it was added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
}

/// A canonical source path tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    path: PathBuf,
    kind: SourceKind,
}

impl SourceEntry {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }
}

/// Files reached by expanding the registry.
#[derive(Debug, Default)]
pub struct Expansion {
    /// Regular files in traversal order, each listed once.
    pub files: Vec<PathBuf>,
    /// Registered paths that no longer exist.
    pub missing: Vec<PathBuf>,
    /// Paths dropped by filter rules.
    pub filtered: usize,
}

/// An ordered set of source entries with unique canonical paths.
#[derive(Debug, Default, Clone)]
pub struct PathRegistry {
    entries: Vec<SourceEntry>,
}

impl PathRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a path, returning `false` if its canonical form was already present.
    pub fn add(&mut self, path: impl AsRef<Path>) -> bool {
        let path = canonicalize_lenient(path.as_ref());
        if self.contains(&path) {
            debug!(path = %path.display(), "source already registered");
            return false;
        }

        let kind = if path.is_dir() {
            SourceKind::Directory
        } else {
            SourceKind::File
        };
        debug!(path = %path.display(), ?kind, "source registered");
        self.entries.push(SourceEntry { path, kind });
        true
    }

    /// Removes the entry whose canonical path matches. Absent paths are ignored.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let path = canonicalize_lenient(path.as_ref());
        let before = self.entries.len();
        self.entries.retain(|entry| entry.path != path);
        before != self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, canonical: &Path) -> bool {
        self.entries.iter().any(|entry| entry.path == canonical)
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Expands every entry into regular files.
    ///
    /// Entries are visited in insertion order; directories are walked
    /// recursively with siblings sorted by name, so a fixed filesystem yields a
    /// fixed sequence. A file reachable from two entries is listed once.
    /// Symlinks are not followed. Directories the filters refuse to enter are
    /// pruned whole; their files are not counted as filtered.
    pub fn expand(&self, filters: Option<&CompiledFilters>) -> Expansion {
        let mut expansion = Expansion::default();
        let mut seen = HashSet::new();

        for entry in &self.entries {
            let metadata = match fs::symlink_metadata(&entry.path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %entry.path.display(), error = %e, "source unavailable");
                    expansion.missing.push(entry.path.clone());
                    continue;
                }
            };

            if metadata.is_file() {
                push_file(&mut expansion, &mut seen, filters, entry.path.clone());
                continue;
            }
            if !metadata.is_dir() {
                continue;
            }

            let walker = WalkDir::new(&entry.path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|dir_entry| {
                    let enter = dir_entry.depth() == 0
                        || !dir_entry.file_type().is_dir()
                        || filters.is_none_or(|f| f.descends_into(dir_entry.path()));
                    if !enter {
                        debug!(path = %dir_entry.path().display(), "pruning hidden directory");
                    }
                    enter
                });
            for walked in walker {
                match walked {
                    Ok(dir_entry) if dir_entry.file_type().is_file() => {
                        push_file(&mut expansion, &mut seen, filters, dir_entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "skipping unreadable entry"),
                }
            }
        }

        expansion
    }
}

fn push_file(
    expansion: &mut Expansion,
    seen: &mut HashSet<PathBuf>,
    filters: Option<&CompiledFilters>,
    path: PathBuf,
) {
    if let Some(filters) = filters
        && !filters.should_include(&path)
    {
        expansion.filtered += 1;
        return;
    }
    if seen.insert(path.clone()) {
        expansion.files.push(path);
    }
}

/// Resolves symlinks and relative segments. Falls back to a lexical
/// normalization against the working directory when the path does not exist.
pub fn canonicalize_lenient(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}
