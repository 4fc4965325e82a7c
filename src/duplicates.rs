//! Duplicate detection over the registered sources.
//!
//! Every file reached from the registry is fingerprinted and grouped by
//! digest. Groups keep first-seen order: the first member is the original,
//! the rest are duplicates of it. Files that cannot be read are counted and
//! left out of grouping.

use crate::config::CompiledFilters;
use crate::file_category::FileMapper;
use crate::hasher::{ContentHasher, Fingerprint};
use crate::record::FileRecord;
use crate::registry::PathRegistry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Files sharing one fingerprint, in the order they were found.
///
/// A group always holds at least two members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub fingerprint: Fingerprint,
    original: FileRecord,
    duplicates: Vec<FileRecord>,
}

impl DuplicateGroup {
    /// Builds a group, or `None` when fewer than two files share the content.
    pub fn new(fingerprint: Fingerprint, members: Vec<FileRecord>) -> Option<Self> {
        let mut members = members.into_iter();
        let original = members.next()?;
        let duplicates: Vec<FileRecord> = members.collect();
        if duplicates.is_empty() {
            return None;
        }
        Some(Self {
            fingerprint,
            original,
            duplicates,
        })
    }

    /// The first file found with this content.
    pub fn original(&self) -> &FileRecord {
        &self.original
    }

    /// Every member after the original.
    pub fn duplicates(&self) -> &[FileRecord] {
        &self.duplicates
    }

    /// The original followed by its duplicates.
    pub fn members(&self) -> impl Iterator<Item = &FileRecord> {
        std::iter::once(&self.original).chain(&self.duplicates)
    }

    pub fn member_count(&self) -> usize {
        self.duplicates.len() + 1
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.members().map(|record| record.path.as_path())
    }

    /// Bytes that removing the duplicates would free.
    pub fn wasted_bytes(&self) -> u64 {
        self.duplicates().iter().map(|record| record.size).sum()
    }
}

/// Result of a duplicate search.
#[derive(Debug, Default)]
pub struct DuplicateReport {
    /// Groups with two or more members, ordered by their original's position.
    pub groups: Vec<DuplicateGroup>,
    /// Every file the search attempted, readable or not.
    pub files_scanned: usize,
    /// Files that could not be fingerprinted.
    pub unreadable: Vec<(PathBuf, String)>,
    /// Registered sources that no longer exist.
    pub missing_sources: Vec<PathBuf>,
}

impl DuplicateReport {
    pub fn duplicate_count(&self) -> usize {
        self.groups.iter().map(|group| group.duplicates().len()).sum()
    }

    pub fn wasted_bytes(&self) -> u64 {
        self.groups.iter().map(DuplicateGroup::wasted_bytes).sum()
    }
}

/// Finds files with identical content.
#[derive(Debug, Default, Clone)]
pub struct DuplicateDetector {
    mapper: FileMapper,
    hasher: ContentHasher,
}

impl DuplicateDetector {
    pub fn new(hasher: ContentHasher) -> Self {
        Self {
            mapper: FileMapper::default(),
            hasher,
        }
    }

    /// Groups every file reachable from `registry` by content.
    pub fn find_duplicates(
        &self,
        registry: &PathRegistry,
        filters: Option<&CompiledFilters>,
    ) -> DuplicateReport {
        let expansion = registry.expand(filters);
        let mut report = DuplicateReport {
            files_scanned: expansion.files.len(),
            missing_sources: expansion.missing,
            ..Default::default()
        };

        let mut order: Vec<Fingerprint> = Vec::new();
        let mut by_fingerprint: HashMap<Fingerprint, Vec<FileRecord>> = HashMap::new();

        for path in &expansion.files {
            let record = match FileRecord::from_path(path, &self.mapper, &self.hasher) {
                Ok(record) => record,
                Err(e) => {
                    warn!(error = %e, "excluding unreadable file from duplicate grouping");
                    report.unreadable.push((path.clone(), e.to_string()));
                    continue;
                }
            };
            debug!(path = %path.display(), fingerprint = %record.fingerprint, "fingerprinted");

            let members = by_fingerprint.entry(record.fingerprint).or_default();
            if members.is_empty() {
                order.push(record.fingerprint);
            }
            members.push(record);
        }

        for fingerprint in order {
            if let Some(group) = by_fingerprint
                .remove(&fingerprint)
                .and_then(|members| DuplicateGroup::new(fingerprint, members))
            {
                report.groups.push(group);
            }
        }

        info!(
            scanned = report.files_scanned,
            groups = report.groups.len(),
            unreadable = report.unreadable.len(),
            "duplicate search finished"
        );
        report
    }
}

/// Groups files reachable from `registry` using default settings and no filters.
pub fn find_duplicates(registry: &PathRegistry) -> DuplicateReport {
    DuplicateDetector::default().find_duplicates(registry, None)
}
