//! Command-line interface for reshelve.
//!
//! Parses arguments, loads configuration, builds a [`Session`] and runs one
//! subcommand against it. Errors come back as display strings for `main` to
//! print.

use crate::config::Config;
use crate::export::{self, RecordQuery, SortKey};
use crate::output::OutputFormatter;
use crate::session::Session;
use crate::shell;
use clap::{Parser, Subcommand, ValueEnum};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// reshelve - sort files into category folders, find duplicates, undo moves
#[derive(Parser, Debug)]
#[command(name = "reshelve")]
#[command(version, long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Where to keep the undo history (overrides the configuration)
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Move files into category folders under a target directory
    Organize {
        /// Files or folders to organize
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Directory that receives the category folders
        #[arg(short, long)]
        target: PathBuf,

        /// Show where files would go without moving anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Move files straight into the target, without category folders
        #[arg(long)]
        flat: bool,
    },

    /// Find files with identical content
    Duplicates {
        /// Files or folders to compare
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Write every duplicate to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Fingerprint every file under a directory
    Scan {
        root: PathBuf,

        /// Write the scan results to a CSV file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Keep only files whose name contains this text (case-insensitive)
        #[arg(long)]
        name: Option<String>,

        /// Order listed and exported rows by this column
        #[arg(short = 's', long = "sort", value_enum)]
        sort_by: Option<SortOrder>,

        /// Reverse sort order
        #[arg(short = 'r', long)]
        reverse: bool,
    },

    /// Reverse the last organize run
    Undo,

    /// Interactive session
    Shell,
}

/// Column choices for `scan --sort`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortOrder {
    Name,
    Size,
    Category,
    Hash,
}

impl From<SortOrder> for SortKey {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Name => SortKey::Name,
            SortOrder::Size => SortKey::Size,
            SortOrder::Category => SortKey::Category,
            SortOrder::Hash => SortKey::Hash,
        }
    }
}

/// Builds a session from the global options.
pub fn build_session(config_path: Option<&Path>, ledger: Option<&Path>) -> Result<Session, String> {
    let config =
        Config::load(config_path).map_err(|e| format!("Error loading configuration: {}", e))?;
    debug!(?config, "configuration loaded");

    let session =
        Session::new(&config).map_err(|e| format!("Error compiling filters: {}", e))?;
    Ok(match ledger {
        Some(path) => session.with_ledger_path(path),
        None => session,
    })
}

/// Runs the parsed command line.
pub fn run(cli: Cli) -> Result<(), String> {
    let mut session = build_session(cli.config.as_deref(), cli.ledger.as_deref())?;

    match cli.command {
        Command::Organize {
            sources,
            target,
            dry_run,
            flat,
        } => {
            add_sources(&mut session, &sources);
            session.set_target(target);
            if flat {
                session.set_group_by_category(false);
            }
            if dry_run {
                preview(&session)
            } else {
                organize(&mut session)
            }
        }
        Command::Duplicates { sources, export } => {
            add_sources(&mut session, &sources);
            duplicates(&session, export.as_deref())
        }
        Command::Scan {
            root,
            export,
            name,
            sort_by,
            reverse,
        } => {
            let query = RecordQuery {
                name_contains: name,
                sort_by: sort_by.map(SortKey::from),
                descending: reverse,
            };
            scan(&session, &root, export.as_deref(), &query).map(|_| ())
        }
        Command::Undo => undo(&mut session),
        Command::Shell => shell::run_shell(&mut session, io::stdin().lock()),
    }
}

fn add_sources(session: &mut Session, sources: &[PathBuf]) {
    for source in sources {
        if !session.add_source(source) {
            OutputFormatter::warning(&format!("{} listed twice", source.display()));
        }
    }
}

pub(crate) fn preview(session: &Session) -> Result<(), String> {
    let plan = session.preview().map_err(|e| e.to_string())?;
    OutputFormatter::plan_listing(&plan);
    Ok(())
}

pub(crate) fn organize(session: &mut Session) -> Result<(), String> {
    if let Some(target) = session.target() {
        OutputFormatter::info(&format!("Organizing into: {}", target.display()));
    }
    let summary = session.organize().map_err(|e| e.to_string())?;
    OutputFormatter::organize_summary(&summary);

    if summary.moved() > 0 {
        OutputFormatter::plain(&format!(
            "History saved to {}. Run 'reshelve undo' to revert.",
            session.ledger().path().display()
        ));
    }
    if !summary.failed.is_empty() {
        OutputFormatter::warning("Some files could not be organized. Please review errors above.");
    }
    Ok(())
}

pub(crate) fn duplicates(session: &Session, export_to: Option<&Path>) -> Result<(), String> {
    let report = session.find_duplicates();
    OutputFormatter::duplicate_report(&report);

    if let Some(path) = export_to {
        let rows = export::export_duplicates(path, &report).map_err(|e| e.to_string())?;
        OutputFormatter::success(&format!("Exported {} rows to {}", rows, path.display()));
    }
    Ok(())
}

pub(crate) fn scan(
    session: &Session,
    root: &Path,
    export_to: Option<&Path>,
    query: &RecordQuery,
) -> Result<crate::scanner::ScanOutcome, String> {
    let pb = OutputFormatter::create_progress_bar(0);
    let outcome = session
        .deep_scan(
            root,
            |completed, total| {
                pb.set_length(total as u64);
                pb.set_position(completed as u64);
            },
            |record| pb.set_message(record.file_name.clone()),
            |_| pb.finish_and_clear(),
        )
        .map_err(|e| e.to_string())?;
    OutputFormatter::scan_summary(&outcome);

    let selected = query.apply(&outcome.records);
    if !query.is_empty() {
        OutputFormatter::record_listing(&selected);
    }
    if let Some(path) = export_to {
        let rows = export::export_records(path, selected).map_err(|e| e.to_string())?;
        OutputFormatter::success(&format!("Exported {} rows to {}", rows, path.display()));
    }
    Ok(outcome)
}

pub(crate) fn undo(session: &mut Session) -> Result<(), String> {
    let outcome = session.undo().map_err(|e| e.to_string())?;
    OutputFormatter::undo_outcome(&outcome);
    Ok(())
}
