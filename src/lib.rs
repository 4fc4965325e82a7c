//! reshelve - file organization, duplicate detection and reversible moves
//!
//! The library classifies files by extension, relocates them into category
//! folders without ever overwriting, groups files by content fingerprint,
//! scans large trees on a worker thread, and records every relocation so a
//! whole organize run can be undone.

pub mod cli;
pub mod config;
pub mod duplicates;
pub mod export;
pub mod file_category;
pub mod file_organizer;
pub mod hasher;
pub mod logging;
pub mod output;
pub mod record;
pub mod registry;
pub mod relocator;
pub mod scanner;
pub mod session;
pub mod shell;
pub mod undo;

pub use config::{CompiledFilters, Config, ConfigError};
pub use duplicates::{DuplicateDetector, DuplicateGroup, DuplicateReport};
pub use file_category::{Category, FileMapper};
pub use file_organizer::{FileOrganizer, OrganizeError, OrganizeOptions, OrganizeSummary};
pub use hasher::{ContentHasher, Fingerprint, HashError};
pub use record::FileRecord;
pub use registry::PathRegistry;
pub use relocator::RelocateError;
pub use scanner::{ScanError, ScanEvent, ScanOrchestrator, ScanOutcome};
pub use session::Session;
pub use undo::{UndoLedger, UndoOutcome, UndoReport};
