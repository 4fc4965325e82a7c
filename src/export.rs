//! Tabular export of scan and duplicate results.
//!
//! Both exports share one header so a spreadsheet opened on either file lines
//! up the same way. Duplicate groups are written member by member, grouped
//! together and in the order they were found.

use crate::duplicates::DuplicateReport;
use crate::record::FileRecord;
use chrono::Local;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

/// Column names, in order.
pub const HEADER: [&str; 5] = ["filename", "size", "category", "content_type", "hash"];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("cannot write export to {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to encode export row: {0}")]
    Csv(#[from] csv::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Column to order exported rows by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Size,
    Category,
    Hash,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "size" => Ok(SortKey::Size),
            "category" => Ok(SortKey::Category),
            "hash" => Ok(SortKey::Hash),
            other => Err(format!("unknown sort column: {other} (name, size, category, hash)")),
        }
    }
}

/// Narrows and orders records before they are listed or exported.
///
/// The name filter is a case-insensitive substring match on the file name.
/// Sorting is stable, so ties keep traversal order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub name_contains: Option<String>,
    pub sort_by: Option<SortKey>,
    pub descending: bool,
}

impl RecordQuery {
    pub fn is_empty(&self) -> bool {
        self.name_contains.is_none() && self.sort_by.is_none()
    }

    pub fn matches(&self, record: &FileRecord) -> bool {
        match &self.name_contains {
            Some(needle) => record
                .file_name
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            None => true,
        }
    }

    pub fn apply<'a>(
        &self,
        records: impl IntoIterator<Item = &'a FileRecord>,
    ) -> Vec<&'a FileRecord> {
        let mut selected: Vec<&FileRecord> =
            records.into_iter().filter(|r| self.matches(r)).collect();

        if let Some(key) = self.sort_by {
            selected.sort_by(|a, b| {
                let ordering = match key {
                    SortKey::Name => a.file_name.to_lowercase().cmp(&b.file_name.to_lowercase()),
                    SortKey::Size => a.size.cmp(&b.size),
                    SortKey::Category => a.category.cmp(&b.category),
                    SortKey::Hash => a.fingerprint.cmp(&b.fingerprint),
                };
                if self.descending { ordering.reverse() } else { ordering }
            });
        }
        selected
    }
}

fn row(record: &FileRecord) -> [String; 5] {
    [
        record.file_name.clone(),
        record.size.to_string(),
        record.category.to_string(),
        record.mime_type.clone().unwrap_or_default(),
        record.fingerprint.to_string(),
    ]
}

/// Writes the header and one row per record. Returns the number of rows.
pub fn write_records<'a, W: Write>(
    writer: W,
    records: impl IntoIterator<Item = &'a FileRecord>,
) -> ExportResult<usize> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(HEADER)?;

    let mut rows = 0;
    for record in records {
        wtr.write_record(row(record))?;
        rows += 1;
    }
    wtr.flush().map_err(csv::Error::from)?;
    Ok(rows)
}

/// Writes every member of every duplicate group.
pub fn write_duplicates<W: Write>(writer: W, report: &DuplicateReport) -> ExportResult<usize> {
    write_records(
        writer,
        report.groups.iter().flat_map(|group| group.members()),
    )
}

fn create(path: &Path) -> ExportResult<File> {
    File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Exports scan records to a file at `path`, replacing it.
pub fn export_records<'a>(
    path: &Path,
    records: impl IntoIterator<Item = &'a FileRecord>,
) -> ExportResult<usize> {
    let rows = write_records(create(path)?, records)?;
    info!(path = %path.display(), rows, "exported scan results");
    Ok(rows)
}

/// Exports duplicate groups to a file at `path`, replacing it.
pub fn export_duplicates(path: &Path, report: &DuplicateReport) -> ExportResult<usize> {
    let rows = write_duplicates(create(path)?, report)?;
    info!(path = %path.display(), rows, "exported duplicate groups");
    Ok(rows)
}

/// A timestamped file name such as `reshelve-scan-20240131-142501.csv`.
pub fn default_export_name(kind: &str) -> String {
    format!("reshelve-{kind}-{}.csv", Local::now().format("%Y%m%d-%H%M%S"))
}
