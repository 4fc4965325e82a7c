//! Configuration loaded from TOML.
//!
//! Three sections are recognized; every key is optional.
//!
//! ```toml
//! [filters]
//! enable_hidden_files = false
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "**/node_modules/**"]
//! extensions = ["bak", "part"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [organize]
//! group_by_category = true
//! ledger_file = ".reshelve_undo.json"
//!
//! [scan]
//! block_size = 65536
//! channel_capacity = 256
//! ```
//!
//! Filters prune the files expanded from the source list before organizing or
//! duplicate detection. Include patterns win over every exclude rule.

use crate::hasher::DEFAULT_BLOCK_SIZE;
use crate::undo::DEFAULT_LEDGER_FILE;
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur during configuration loading and filter compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),

    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("failed to read configuration: {0}")]
    IoError(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub filters: FilterRules,
    pub organize: OrganizeSettings,
    pub scan: ScanSettings,
}

/// Which expanded files take part in organize and duplicate runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Whether files whose name starts with "." are considered.
    pub enable_hidden_files: bool,
    pub exclude: ExcludeRules,
    /// Whitelist that overrides every exclude rule.
    pub include: IncludeRules,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeRules {
    /// Exact file names.
    pub filenames: Vec<String>,
    /// Glob patterns matched against the full path.
    pub patterns: Vec<String>,
    /// Extensions without the dot, case-insensitive.
    pub extensions: Vec<String>,
    /// Regexes matched against the file name.
    pub regex: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncludeRules {
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizeSettings {
    /// Sort into one subfolder per category; otherwise move straight into the target.
    pub group_by_category: bool,
    /// Where the undo batch is persisted, relative to the working directory.
    pub ledger_file: PathBuf,
}

impl Default for OrganizeSettings {
    fn default() -> Self {
        Self {
            group_by_category: true,
            ledger_file: PathBuf::from(DEFAULT_LEDGER_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Read size used when fingerprinting.
    pub block_size: usize,
    /// Capacity of the queue between the scan worker and its consumer.
    pub channel_capacity: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            channel_capacity: 256,
        }
    }
}

impl Config {
    /// Load configuration, falling back to defaults.
    ///
    /// Looks in this order:
    /// 1. `config_path`, if given (must exist)
    /// 2. `.reshelverc.toml` in the current directory
    /// 3. `~/.config/reshelve/config.toml`
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".reshelverc.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("reshelve")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compiles the filter rules.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Filter rules with patterns parsed once up front.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

fn compile_globs(patterns: &[String]) -> Result<Vec<Pattern>, ConfigError> {
    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
        })
        .collect()
}

impl CompiledFilters {
    pub fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.iter().cloned().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns: compile_globs(&rules.exclude.patterns)?,
            exclude_regexes,
            include_patterns: compile_globs(&rules.include.patterns)?,
        })
    }

    /// Returns true if a directory found while walking a source is entered.
    ///
    /// Hidden directories such as `.git` are pruned with their contents
    /// unless hidden files are enabled.
    pub fn descends_into(&self, dir: &Path) -> bool {
        self.enable_hidden_files
            || !dir
                .file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'))
    }

    /// Returns true if the file should take part in the run.
    ///
    /// Include patterns are checked first; then hidden names, exact names,
    /// extensions, globs and regexes each exclude.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self
            .include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return true;
        }

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension()
            && self
                .exclude_extensions
                .contains(&ext.to_string_lossy().to_lowercase())
        {
            return false;
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
        {
            return false;
        }

        !self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(rules: FilterRules) -> CompiledFilters {
        CompiledFilters::new(&rules).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.filters.enable_hidden_files);
        assert!(config.organize.group_by_category);
        assert_eq!(config.organize.ledger_file, PathBuf::from(DEFAULT_LEDGER_FILE));
        assert_eq!(config.scan.block_size, 64 * 1024);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
            [organize]
            group_by_category = false

            [filters.exclude]
            extensions = ["bak"]
            "#,
        )
        .unwrap();

        assert!(!config.organize.group_by_category);
        assert_eq!(config.organize.ledger_file, PathBuf::from(DEFAULT_LEDGER_FILE));
        assert_eq!(config.filters.exclude.extensions, vec!["bak".to_string()]);
        assert_eq!(config.scan, ScanSettings::default());
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let result = Config::from_toml_str("[organize]\ngroup_by_category = \"yes\"");
        assert!(matches!(result, Err(ConfigError::ConfigInvalid(_))));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let result = Config::load(Some(Path::new("/no/such/reshelve.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }

    #[test]
    fn test_hidden_files_excluded_by_default() {
        let compiled = filters(FilterRules::default());
        assert!(!compiled.should_include(Path::new("/data/.DS_Store")));
        assert!(compiled.should_include(Path::new("/data/photo.jpg")));
    }

    #[test]
    fn test_hidden_files_included_when_enabled() {
        let compiled = filters(FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        });
        assert!(compiled.should_include(Path::new(".DS_Store")));
    }

    #[test]
    fn test_exclude_names_and_extensions() {
        let compiled = filters(FilterRules {
            exclude: ExcludeRules {
                filenames: vec!["Thumbs.db".to_string()],
                extensions: vec![".BAK".to_string(), "tmp".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!compiled.should_include(Path::new("/x/Thumbs.db")));
        assert!(!compiled.should_include(Path::new("/x/file.bak")));
        assert!(!compiled.should_include(Path::new("/x/file.TMP")));
        assert!(compiled.should_include(Path::new("/x/file.txt")));
    }

    #[test]
    fn test_exclude_globs_on_absolute_paths() {
        let compiled = filters(FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["*.cache".to_string(), "**/node_modules/**".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!compiled.should_include(Path::new("/src/app/file.cache")));
        assert!(!compiled.should_include(Path::new("/src/node_modules/pkg/index.js")));
        assert!(compiled.should_include(Path::new("/src/my_node_modules/pkg/index.js")));
    }

    #[test]
    fn test_exclude_regex_on_file_name() {
        let compiled = filters(FilterRules {
            exclude: ExcludeRules {
                regex: vec![r"^test_.*\.txt$".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!compiled.should_include(Path::new("/a/test_file.txt")));
        assert!(compiled.should_include(Path::new("/a/file.txt")));
    }

    #[test]
    fn test_hidden_directories_are_not_entered_by_default() {
        let strict = filters(FilterRules::default());
        assert!(!strict.descends_into(Path::new("/repo/.git")));
        assert!(strict.descends_into(Path::new("/repo/src")));

        let permissive = filters(FilterRules {
            enable_hidden_files: true,
            ..Default::default()
        });
        assert!(permissive.descends_into(Path::new("/repo/.git")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = filters(FilterRules {
            include: IncludeRules {
                patterns: vec!["**/.important".to_string()],
            },
            ..Default::default()
        });

        assert!(compiled.should_include(Path::new("/a/.important")));
        assert!(!compiled.should_include(Path::new("/a/.other")));
    }

    #[test]
    fn test_invalid_patterns_return_errors() {
        let bad_regex = CompiledFilters::new(&FilterRules {
            exclude: ExcludeRules {
                regex: vec!["[invalid(".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(matches!(
            bad_regex,
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = CompiledFilters::new(&FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["[invalid".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });
        assert!(matches!(bad_glob, Err(ConfigError::InvalidGlobPattern(_))));
    }
}
