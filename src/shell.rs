//! Line-oriented interactive session.
//!
//! Keeps one [`Session`] alive across commands so sources, the target and the
//! single-step undo history carry over from one line to the next.

use crate::cli;
use crate::export::{self, RecordQuery, SortKey};
use crate::output::OutputFormatter;
use crate::session::Session;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

const HELP: &str = "\
commands:
  add <path>            select a file or folder
  remove <path>         deselect it
  clear                 deselect everything
  sources               list the selection
  target <dir>          set the target folder
  preview               show where organize would move things
  organize              move the selection into the target
  dupes                 find duplicates in the selection
  scan <dir>            fingerprint everything under a folder
  filter [text]         keep only names containing text (no text clears)
  sort <column> [desc]  order by name, size, category or hash
  sort                  back to traversal order
  export <file.csv>     write the last scan or duplicate search
  move <file>           move one file into the target
  copy <file> <dir>     copy one file into a folder
  undo                  reverse the last organize
  undo-last             reverse the last move or copy
  help                  show this text
  quit                  leave";

/// Result set remembered for `export`.
enum LastResult {
    Scan(Vec<crate::record::FileRecord>),
    Duplicates(crate::duplicates::DuplicateReport),
}

/// Whether the loop keeps reading.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Shell<'a> {
    session: &'a mut Session,
    last: Option<LastResult>,
    query: RecordQuery,
}

/// Splits a line into words; double quotes group words containing spaces.
pub fn split_words(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    words.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        words.push(current);
    }
    words
}

impl<'a> Shell<'a> {
    pub fn new(session: &'a mut Session) -> Self {
        Self {
            session,
            last: None,
            query: RecordQuery::default(),
        }
    }

    /// Runs one command line. Command failures are printed, not returned.
    pub fn execute(&mut self, line: &str) -> Flow {
        let words = split_words(line);
        let Some((command, args)) = words.split_first() else {
            return Flow::Continue;
        };

        let result = match (command.as_str(), args) {
            ("quit" | "exit", _) => return Flow::Quit,
            ("help", _) => {
                OutputFormatter::plain(HELP);
                Ok(())
            }
            ("add", [path]) => {
                if !self.session.add_source(path) {
                    OutputFormatter::warning("already selected");
                }
                Ok(())
            }
            ("remove", [path]) => {
                if !self.session.remove_source(path) {
                    OutputFormatter::warning("not selected");
                }
                Ok(())
            }
            ("clear", []) => {
                self.session.clear_sources();
                Ok(())
            }
            ("sources", []) => {
                self.list_sources();
                Ok(())
            }
            ("target", [dir]) => {
                self.session.set_target(dir);
                Ok(())
            }
            ("preview", []) => cli::preview(self.session),
            ("organize", []) => cli::organize(self.session),
            ("dupes", []) => {
                let report = self.session.find_duplicates();
                OutputFormatter::duplicate_report(&report);
                self.last = Some(LastResult::Duplicates(report));
                Ok(())
            }
            ("scan", [root]) => cli::scan(self.session, Path::new(root), None, &self.query)
                .map(|outcome| {
                    self.last = Some(LastResult::Scan(outcome.records));
                }),
            ("filter", []) => {
                self.query.name_contains = None;
                self.show_matches();
                Ok(())
            }
            ("filter", [text]) => {
                self.query.name_contains = Some(text.clone());
                self.show_matches();
                Ok(())
            }
            ("sort", []) => {
                self.query.sort_by = None;
                self.query.descending = false;
                self.show_matches();
                Ok(())
            }
            ("sort", [column]) => self.set_sort(column, false),
            ("sort", [column, order]) if order == "desc" => self.set_sort(column, true),
            ("sort", [column, order]) if order == "asc" => self.set_sort(column, false),
            ("export", [file]) => self.export(Path::new(file)),
            ("move", [file]) => self
                .session
                .move_into_target(Path::new(file))
                .map(|to| OutputFormatter::success(&format!("Moved to {}", to.display())))
                .map_err(|e| e.to_string()),
            ("copy", [file, dir]) => self
                .session
                .copy_into(Path::new(file), Path::new(dir))
                .map(|to| OutputFormatter::success(&format!("Copied to {}", to.display())))
                .map_err(|e| e.to_string()),
            ("undo", []) => cli::undo(self.session),
            ("undo-last", []) => match self.session.undo_last() {
                Ok(Some(_)) => {
                    OutputFormatter::success("Undone");
                    Ok(())
                }
                Ok(None) => {
                    OutputFormatter::info("Nothing to undo");
                    Ok(())
                }
                Err(e) => Err(e.to_string()),
            },
            (other, _) => Err(format!("unknown command or wrong arguments: {other} (try 'help')")),
        };

        if let Err(message) = result {
            OutputFormatter::error(&message);
        }
        Flow::Continue
    }

    fn list_sources(&self) {
        let entries = self.session.sources().entries();
        if entries.is_empty() {
            OutputFormatter::info("No sources selected");
        }
        for entry in entries {
            OutputFormatter::plain(&format!("  {:?}  {}", entry.kind(), entry.path().display()));
        }
        match self.session.target() {
            Some(target) => OutputFormatter::plain(&format!("target: {}", target.display())),
            None => OutputFormatter::plain("target: (not set)"),
        }
    }

    fn set_sort(&mut self, column: &str, descending: bool) -> Result<(), String> {
        self.query.sort_by = Some(column.parse::<SortKey>()?);
        self.query.descending = descending;
        self.show_matches();
        Ok(())
    }

    /// Lists the last scan through the current filter and sort.
    fn show_matches(&self) {
        if let Some(LastResult::Scan(records)) = &self.last {
            OutputFormatter::record_listing(&self.query.apply(records));
        }
    }

    fn export(&self, path: &Path) -> Result<(), String> {
        let (rows, path) = match &self.last {
            Some(LastResult::Scan(records)) => {
                let path = export_target(path, "scan");
                (export::export_records(&path, self.query.apply(records)), path)
            }
            Some(LastResult::Duplicates(report)) if self.query.name_contains.is_some() => {
                // Groups stay in found order; only the name filter applies.
                let names_only = RecordQuery {
                    name_contains: self.query.name_contains.clone(),
                    ..Default::default()
                };
                let path = export_target(path, "duplicates");
                let members = report.groups.iter().flat_map(|group| group.members());
                (export::export_records(&path, names_only.apply(members)), path)
            }
            Some(LastResult::Duplicates(report)) => {
                let path = export_target(path, "duplicates");
                (export::export_duplicates(&path, report), path)
            }
            None => return Err("nothing to export yet; run scan or dupes first".to_string()),
        };
        let rows = rows.map_err(|e| e.to_string())?;
        OutputFormatter::success(&format!("Exported {} rows to {}", rows, path.display()));
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &*self.session
    }
}

/// Reads commands from `input` until `quit` or end of input.
pub fn run_shell<R: BufRead>(session: &mut Session, input: R) -> Result<(), String> {
    let mut shell = Shell::new(session);
    OutputFormatter::info("reshelve shell. Type 'help' for commands.");

    let mut lines = input.lines();
    loop {
        print!("reshelve> ");
        io::stdout().flush().map_err(|e| e.to_string())?;

        let Some(line) = lines.next() else {
            println!();
            return Ok(());
        };
        let line = line.map_err(|e| format!("Error reading input: {}", e))?;
        if shell.execute(&line) == Flow::Quit {
            return Ok(());
        }
    }
}

/// A directory argument gets a timestamped file name inside it.
fn export_target(path: &Path, kind: &str) -> PathBuf {
    if path.is_dir() {
        path.join(export::default_export_name(kind))
    } else {
        path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_words_handles_quotes() {
        assert_eq!(split_words("add  a.txt"), vec!["add", "a.txt"]);
        assert_eq!(
            split_words(r#"copy "my file.txt" out"#),
            vec!["copy", "my file.txt", "out"]
        );
        assert_eq!(split_words(r#"add """#), vec!["add", ""]);
        assert!(split_words("   ").is_empty());
    }

    #[test]
    fn test_shell_keeps_state_between_lines() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let inbox = temp_dir.path().join("inbox");
        fs::create_dir(&inbox).unwrap();
        fs::write(inbox.join("a.pdf"), "a").unwrap();
        let out = temp_dir.path().join("out");

        let mut session = Session::new(&Config::default())
            .unwrap()
            .with_ledger_path(temp_dir.path().join("ledger.json"));
        let mut shell = Shell::new(&mut session);

        assert_eq!(shell.execute(&format!("add \"{}\"", inbox.display())), Flow::Continue);
        assert_eq!(shell.execute(&format!("target \"{}\"", out.display())), Flow::Continue);
        assert_eq!(shell.session().sources().len(), 1);

        shell.execute("organize");
        assert!(out.join("Documents/a.pdf").exists());

        shell.execute("undo");
        assert!(inbox.join("a.pdf").exists());

        assert_eq!(shell.execute("bogus"), Flow::Continue);
        assert_eq!(shell.execute("quit"), Flow::Quit);
    }

    #[test]
    fn test_filter_and_sort_narrow_scan_export() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let tree = temp_dir.path().join("tree");
        fs::create_dir(&tree).unwrap();
        fs::write(tree.join("IMG_small.jpg"), "1").unwrap();
        fs::write(tree.join("img_large.jpg"), "12345").unwrap();
        fs::write(tree.join("notes.txt"), "123").unwrap();
        let csv_path = temp_dir.path().join("scan.csv");

        let mut session = Session::new(&Config::default())
            .unwrap()
            .with_ledger_path(temp_dir.path().join("ledger.json"));
        let mut shell = Shell::new(&mut session);

        shell.execute(&format!("scan \"{}\"", tree.display()));
        shell.execute("filter img");
        shell.execute("sort size desc");
        shell.execute(&format!("export \"{}\"", csv_path.display()));

        let text = fs::read_to_string(&csv_path).unwrap();
        let names: Vec<&str> = text
            .lines()
            .skip(1)
            .filter_map(|line| line.split(',').next())
            .collect();
        assert_eq!(names, vec!["img_large.jpg", "IMG_small.jpg"]);

        shell.execute("filter");
        shell.execute("sort");
        shell.execute(&format!("export \"{}\"", csv_path.display()));
        let text = fs::read_to_string(&csv_path).unwrap();
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_sort_rejects_unknown_column() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut session = Session::new(&Config::default())
            .unwrap()
            .with_ledger_path(temp_dir.path().join("ledger.json"));
        let mut shell = Shell::new(&mut session);

        assert!(shell.set_sort("entropy", false).is_err());
        assert!(shell.query.sort_by.is_none());
        assert!(shell.set_sort("name", true).is_ok());
        assert_eq!(shell.query.sort_by, Some(SortKey::Name));
        assert!(shell.query.descending);
    }

    #[test]
    fn test_run_shell_stops_at_end_of_input() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut session = Session::new(&Config::default())
            .unwrap()
            .with_ledger_path(temp_dir.path().join("ledger.json"));
        let input = io::Cursor::new("help\nclear\n");
        assert!(run_shell(&mut session, input).is_ok());
    }
}
