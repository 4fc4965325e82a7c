//! Terminal output for the command-line front end.
//!
//! Everything the binary prints goes through [`OutputFormatter`], so the
//! library modules stay free of presentation. Diagnostics go to `tracing`;
//! this module is for results meant for the user.

use crate::duplicates::DuplicateReport;
use crate::file_category::Category;
use crate::file_organizer::{OrganizeSummary, PlannedMove};
use crate::record::FileRecord;
use crate::scanner::ScanOutcome;
use crate::undo::{UndoOutcome, UndoReport};
use colored::*;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use std::collections::BTreeMap;

fn plural(count: usize) -> &'static str {
    if count == 1 { "file" } else { "files" }
}

fn category_line(category: Category, count: usize, bytes: u64) -> String {
    format!(
        "  {:<10} {:>6} {:>12}",
        category.dir_name(),
        count,
        HumanBytes(bytes).to_string()
    )
}

/// The closing count line of an organize run.
pub fn organize_counts(summary: &OrganizeSummary) -> String {
    format!(
        "Processed {} {}: {} moved, {} skipped, {} failed",
        summary.processed(),
        plural(summary.processed()),
        summary.moved(),
        summary.skipped.len(),
        summary.failed.len()
    )
}

/// Styled printing of messages and result summaries.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// ```no_run
    /// use reshelve::output::OutputFormatter;
    /// OutputFormatter::success("Organized 12 files");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message to stderr in red.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    pub fn plain(message: &str) {
        println!("{}", message);
    }

    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a progress bar for `total` items.
    ///
    /// # Arguments
    ///
    /// * `total` - Number of items the bar counts up to
    ///
    /// # Example
    ///
    /// ```no_run
    /// use reshelve::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar(100);
    /// pb.set_position(40);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb
    }

    /// Prints moved-file counts per category.
    ///
    /// # Arguments
    ///
    /// * `category_counts` - Files moved into each category
    /// * `total_files` - Total number of files moved
    pub fn summary_table(category_counts: &BTreeMap<Category, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let width = category_counts
            .keys()
            .map(|category| category.dir_name().len())
            .max()
            .unwrap_or(0)
            .max("Category".len());

        println!("{:<width$} | {}", "Category".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));
        for (category, count) in category_counts {
            println!(
                "{:<width$} | {} {}",
                category.dir_name(),
                count.to_string().green(),
                plural(*count)
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            plural(total_files)
        );
    }

    pub fn organize_summary(summary: &OrganizeSummary) {
        for record in &summary.moves {
            println!(
                "  {} → {}",
                record.original.display(),
                record.destination.display().to_string().green()
            );
        }
        for (path, reason) in &summary.skipped {
            println!("  {} {} ({})", "skipped".dimmed(), path.display(), reason);
        }
        for (path, reason) in &summary.failed {
            Self::error(&format!("{}: {}", path.display(), reason));
        }
        for path in &summary.missing_sources {
            Self::warning(&format!("source no longer exists: {}", path.display()));
        }

        Self::summary_table(&summary.by_category, summary.moved());
        if summary.failed.is_empty() {
            Self::success(&organize_counts(summary));
        } else {
            Self::warning(&organize_counts(summary));
        }
        if summary.filtered > 0 {
            Self::info(&format!("{} {} excluded by filters", summary.filtered, plural(summary.filtered)));
        }
    }

    pub fn plan_listing(plan: &[PlannedMove]) {
        Self::dry_run_notice(&format!("{} {} would be moved", plan.len(), plural(plan.len())));
        for planned in plan {
            println!(
                "  [{}] {} → {}",
                planned.category.dir_name().cyan(),
                planned.source.display(),
                planned.destination.display()
            );
        }
    }

    /// Lists every duplicate group with its original first.
    pub fn duplicate_report(report: &DuplicateReport) {
        if report.groups.is_empty() {
            Self::success(&format!(
                "No duplicates among {} {}",
                report.files_scanned,
                plural(report.files_scanned)
            ));
        }

        for (index, group) in report.groups.iter().enumerate() {
            Self::header(&format!(
                "Group {} ({}, {})",
                index + 1,
                HumanBytes(group.original().size),
                group.fingerprint
            ));
            println!("  {} {}", "original ".green(), group.original().path.display());
            for duplicate in group.duplicates() {
                println!("  {} {}", "duplicate".yellow(), duplicate.path.display());
            }
        }

        if !report.groups.is_empty() {
            println!();
            Self::info(&format!(
                "{} duplicate {} in {} groups, {} reclaimable",
                report.duplicate_count(),
                plural(report.duplicate_count()),
                report.groups.len(),
                HumanBytes(report.wasted_bytes())
            ));
        }
        for (path, reason) in &report.unreadable {
            Self::warning(&format!("unreadable {}: {}", path.display(), reason));
        }
    }

    pub fn scan_summary(outcome: &ScanOutcome) {
        Self::header("SCAN");
        let mut by_category: BTreeMap<Category, (usize, u64)> = BTreeMap::new();
        for record in &outcome.records {
            let entry = by_category.entry(record.category).or_default();
            entry.0 += 1;
            entry.1 += record.size;
        }
        for (category, (count, bytes)) in &by_category {
            println!("{}", category_line(*category, *count, *bytes));
        }
        Self::success(&format!(
            "Scanned {} of {} {} ({}) under {}",
            outcome.records.len(),
            outcome.total,
            plural(outcome.total),
            HumanBytes(outcome.total_bytes()),
            outcome.root.display()
        ));
        for (path, reason) in &outcome.failures {
            Self::warning(&format!("{}: {}", path.display(), reason));
        }
    }

    /// Lists filtered or sorted scan records, one per line.
    pub fn record_listing(records: &[&FileRecord]) {
        Self::header(&format!("MATCHES ({})", records.len()));
        for record in records {
            println!(
                "  {} {:>12}  {}",
                format!("{:<10}", record.category.dir_name()).cyan(),
                HumanBytes(record.size).to_string(),
                record.path.display()
            );
        }
    }

    pub fn undo_outcome(outcome: &UndoOutcome) {
        match outcome {
            UndoOutcome::NothingToUndo => Self::info("Nothing to undo"),
            UndoOutcome::Undone(report) => Self::undo_report(report),
        }
    }

    fn undo_report(report: &UndoReport) {
        Self::success(&format!(
            "Restored {} {}",
            report.restored_files,
            plural(report.restored_files)
        ));
        for (original, actual) in &report.renamed_restores {
            Self::warning(&format!(
                "{} was occupied, restored as {}",
                original.display(),
                actual.display()
            ));
        }
        for (path, reason) in &report.skipped_files {
            Self::warning(&format!("skipped {}: {}", path.display(), reason));
        }
        for (path, reason) in &report.failed_restores {
            Self::error(&format!("{}: {}", path.display(), reason));
        }
        if !report.failed_restores.is_empty() {
            Self::info("Failed records were kept; run undo again to retry them");
        }
    }
}
