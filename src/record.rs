//! Per-file scan results.

use crate::file_category::{Category, FileMapper};
use crate::hasher::{ContentHasher, Fingerprint, HashError};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a scan learns about one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub category: Category,
    pub fingerprint: Fingerprint,
    /// MIME type sniffed from the leading bytes, when recognizable.
    pub mime_type: Option<String>,
}

impl FileRecord {
    /// Stats, classifies, fingerprints and sniffs the file at `path`.
    pub fn from_path(
        path: &Path,
        mapper: &FileMapper,
        hasher: &ContentHasher,
    ) -> Result<Self, HashError> {
        let metadata = fs::metadata(path).map_err(|e| HashError::from_io(path, e))?;
        let fingerprint = hasher.fingerprint(path)?;
        let mime_type = infer::get_from_path(path)
            .ok()
            .flatten()
            .map(|kind| kind.mime_type().to_string());

        Ok(Self {
            path: path.to_path_buf(),
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: metadata.len(),
            category: mapper.classify_entry(path, metadata.is_dir()),
            fingerprint,
            mime_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_from_png() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("pixel.PNG");
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
        fs::write(&path, png).unwrap();

        let record =
            FileRecord::from_path(&path, &FileMapper::default(), &ContentHasher::default())
                .unwrap();
        assert_eq!(record.file_name, "pixel.PNG");
        assert_eq!(record.size, 12);
        assert_eq!(record.category, Category::Images);
        assert_eq!(record.mime_type.as_deref(), Some("image/png"));
    }

    #[test]
    fn test_record_for_plain_text_has_no_mime() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("notes");
        fs::write(&path, "just words").unwrap();

        let record =
            FileRecord::from_path(&path, &FileMapper::default(), &ContentHasher::default())
                .unwrap();
        assert_eq!(record.category, Category::Others);
        assert_eq!(record.mime_type, None);
    }

    #[test]
    fn test_record_for_missing_file() {
        let result = FileRecord::from_path(
            Path::new("/no/such/file.txt"),
            &FileMapper::default(),
            &ContentHasher::default(),
        );
        assert!(matches!(result, Err(HashError::NotFound(_))));
    }
}
