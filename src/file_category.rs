//! File categorization by extension.
//!
//! Categories come from a static, ordered extension table. The table is
//! scanned front to back and the first category listing an extension wins,
//! so the lookup index built from it never changes between calls.
//!
//! # Examples
//!
//! ```
//! use reshelve::file_category::{Category, FileMapper};
//! use std::path::Path;
//!
//! let mapper = FileMapper::default();
//! assert_eq!(mapper.classify_entry(Path::new("report.PDF"), false), Category::Documents);
//! assert_eq!(mapper.classify_entry(Path::new("photos"), true), Category::Folders);
//! assert_eq!(mapper.classify_entry(Path::new("notes"), false), Category::Others);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

/// The label used to pick a destination subfolder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    Documents,
    Images,
    Videos,
    Music,
    Archives,
    Programs,
    /// Directories, regardless of name.
    Folders,
    /// Files with no matching extension.
    Others,
}

impl Category {
    /// Every category, in table order followed by the fallbacks.
    pub const ALL: [Category; 8] = [
        Category::Documents,
        Category::Images,
        Category::Videos,
        Category::Music,
        Category::Archives,
        Category::Programs,
        Category::Folders,
        Category::Others,
    ];

    /// Returns the directory name for this category.
    ///
    /// # Examples
    ///
    /// ```
    /// use reshelve::file_category::Category;
    ///
    /// assert_eq!(Category::Documents.dir_name(), "Documents");
    /// assert_eq!(Category::Others.dir_name(), "Others");
    /// ```
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Documents => "Documents",
            Category::Images => "Images",
            Category::Videos => "Videos",
            Category::Music => "Music",
            Category::Archives => "Archives",
            Category::Programs => "Programs",
            Category::Folders => "Folders",
            Category::Others => "Others",
        }
    }

    /// Parses a directory name back into a category (case-insensitive).
    pub fn from_dir_name(name: &str) -> Option<Category> {
        Self::ALL
            .into_iter()
            .find(|category| category.dir_name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// The ordered extension table. Extensions are lowercase and carry no dot.
pub const CATEGORY_TABLE: &[(Category, &[&str])] = &[
    (
        Category::Documents,
        &[
            "pdf", "doc", "docx", "txt", "md", "odt", "rtf", "ppt", "pptx", "xls", "xlsx", "csv",
        ],
    ),
    (
        Category::Images,
        &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "webp", "svg"],
    ),
    (
        Category::Videos,
        &["mp4", "mkv", "avi", "mov", "flv", "wmv", "webm"],
    ),
    (Category::Music, &["mp3", "wav", "flac", "aac", "m4a", "ogg"]),
    (
        Category::Archives,
        &["zip", "rar", "7z", "tar", "gz", "bz2"],
    ),
    (Category::Programs, &["exe", "msi", "bat", "sh"]),
];

static EXTENSION_INDEX: LazyLock<HashMap<&'static str, Category>> = LazyLock::new(|| {
    let mut index = HashMap::new();
    for (category, extensions) in CATEGORY_TABLE {
        for ext in *extensions {
            // First table entry wins.
            index.entry(*ext).or_insert(*category);
        }
    }
    index
});

/// Maps filesystem entries to categories.
///
/// The mapper is a thin handle over the process-wide index; cloning or
/// constructing it is free.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMapper;

impl FileMapper {
    pub fn new() -> Self {
        Self
    }

    /// Maps a file extension to a category.
    ///
    /// A leading dot is tolerated, matching is case-insensitive, and an empty
    /// extension never matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use reshelve::file_category::{Category, FileMapper};
    ///
    /// let mapper = FileMapper::default();
    /// assert_eq!(mapper.extension_to_category("pdf"), Some(Category::Documents));
    /// assert_eq!(mapper.extension_to_category(".PNG"), Some(Category::Images));
    /// assert_eq!(mapper.extension_to_category("xyz"), None);
    /// ```
    pub fn extension_to_category(&self, ext: &str) -> Option<Category> {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        if ext.is_empty() {
            return None;
        }
        EXTENSION_INDEX.get(ext.to_lowercase().as_str()).copied()
    }

    /// Classifies a path given whether it is a directory. Touches no filesystem state.
    pub fn classify_entry(&self, path: &Path, is_dir: bool) -> Category {
        if is_dir {
            return Category::Folders;
        }

        path.extension()
            .and_then(|ext| self.extension_to_category(&ext.to_string_lossy()))
            .unwrap_or(Category::Others)
    }

    /// Classifies a path, asking the filesystem whether it is a directory.
    ///
    /// A path that cannot be inspected is treated as a file.
    pub fn classify(&self, path: &Path) -> Category {
        self.classify_entry(path, path.is_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_category_dir_names() {
        assert_eq!(Category::Documents.dir_name(), "Documents");
        assert_eq!(Category::Images.dir_name(), "Images");
        assert_eq!(Category::Videos.dir_name(), "Videos");
        assert_eq!(Category::Music.dir_name(), "Music");
        assert_eq!(Category::Archives.dir_name(), "Archives");
        assert_eq!(Category::Programs.dir_name(), "Programs");
        assert_eq!(Category::Folders.dir_name(), "Folders");
        assert_eq!(Category::Others.dir_name(), "Others");
    }

    #[test]
    fn test_from_dir_name_round_trips_every_category() {
        for category in Category::ALL {
            assert_eq!(Category::from_dir_name(category.dir_name()), Some(category));
        }
        assert_eq!(Category::from_dir_name("music"), Some(Category::Music));
        assert_eq!(Category::from_dir_name("Spreadsheets"), None);
    }

    #[test]
    fn test_extension_case_insensitive() {
        let mapper = FileMapper::default();
        assert_eq!(
            mapper.classify_entry(Path::new("a.PDF"), false),
            mapper.classify_entry(Path::new("a.pdf"), false)
        );
        assert_eq!(mapper.extension_to_category("Mp3"), Some(Category::Music));
    }

    #[test]
    fn test_first_table_entry_wins() {
        // csv is listed under Documents only; the index must not be reordered
        // by a later category.
        let mapper = FileMapper::default();
        assert_eq!(mapper.extension_to_category("csv"), Some(Category::Documents));
        assert_eq!(mapper.extension_to_category("xlsx"), Some(Category::Documents));
    }

    #[test]
    fn test_unmatched_and_empty_extensions_fall_to_others() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.classify_entry(Path::new("Makefile"), false), Category::Others);
        assert_eq!(mapper.classify_entry(Path::new("data.xyz"), false), Category::Others);
        assert_eq!(mapper.classify_entry(Path::new("trailing."), false), Category::Others);
        assert_eq!(mapper.extension_to_category(""), None);
        assert_eq!(mapper.extension_to_category("."), None);
    }

    #[test]
    fn test_directories_are_folders_even_with_extension() {
        let mapper = FileMapper::default();
        assert_eq!(mapper.classify_entry(Path::new("album.mp3"), true), Category::Folders);
    }

    #[test]
    fn test_classify_consults_filesystem_for_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dir = temp_dir.path().join("backup.zip");
        std::fs::create_dir(&dir).expect("Failed to create directory");

        let mapper = FileMapper::default();
        assert_eq!(mapper.classify(&dir), Category::Folders);
        assert_eq!(
            mapper.classify(&temp_dir.path().join("missing.zip")),
            Category::Archives
        );
    }

    #[test]
    fn test_classification_is_stable_across_calls() {
        let mapper = FileMapper::default();
        let first: Vec<_> = ["a.jpg", "b.MKV", "c.sh", "d"]
            .iter()
            .map(|name| mapper.classify_entry(Path::new(name), false))
            .collect();
        let second: Vec<_> = ["d", "c.sh", "b.MKV", "a.jpg"]
            .iter()
            .rev()
            .map(|name| mapper.classify_entry(Path::new(name), false))
            .collect();
        assert_eq!(first, second);
    }
}
