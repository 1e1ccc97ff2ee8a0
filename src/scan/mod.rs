// src/scan/mod.rs

//! Command detection.
//!
//! A [`Parser`] extracts commands from one file-format family. The
//! registry is an explicit list (no reflection, no plugin discovery),
//! so the parser set is statically known and trivially testable. The
//! engine walks the scan root, offers every file to every parser, and
//! concatenates the results; a parser error skips that file only.

pub mod cargo_toml;
pub mod makefile;
pub mod package_json;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::Result;
use crate::model::Command;

/// Capability implemented by every file-format parser.
pub trait Parser: Send + Sync {
    /// Human name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Whether this parser handles the given file.
    fn can_parse(&self, path: &Path) -> bool;

    /// Extract commands from the file. An `Err` marks the file as
    /// parse-skipped; it never aborts the run.
    fn parse_commands(&self, path: &Path) -> Result<Vec<Command>>;
}

/// The statically-known parser set.
pub fn builtin_parsers() -> Vec<Box<dyn Parser>> {
    vec![
        Box::new(package_json::PackageJsonParser),
        Box::new(makefile::MakefileParser),
        Box::new(cargo_toml::CargoTomlParser),
    ]
}

/// Outcome of scanning one project tree.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Detected commands in walk order (sorted per directory, so the
    /// order is deterministic for a given tree).
    pub commands: Vec<Command>,
    /// Files a matching parser failed on.
    pub skipped: Vec<PathBuf>,
}

/// Directories never descended into.
const SKIP_DIRS: &[&str] = &[
    ".git",
    ".domd",
    ".venv",
    "__pycache__",
    "node_modules",
    "target",
];

/// Walk `root` and run every parser against every file.
pub fn scan(root: &Path, parsers: &[Box<dyn Parser>]) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();
    let mut stack = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };

        let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        paths.sort();

        for path in paths {
            if path.is_dir() {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                if SKIP_DIRS.contains(&name) {
                    debug!(dir = %path.display(), "skipping directory");
                } else {
                    stack.push(path);
                }
            } else if path.is_file() {
                scan_file(&path, parsers, &mut outcome);
            }
        }
    }

    outcome
}

fn scan_file(path: &Path, parsers: &[Box<dyn Parser>], outcome: &mut ScanOutcome) {
    for parser in parsers {
        if !parser.can_parse(path) {
            continue;
        }
        match parser.parse_commands(path) {
            Ok(commands) => {
                debug!(
                    file = %path.display(),
                    parser = parser.name(),
                    count = commands.len(),
                    "parsed commands"
                );
                outcome.commands.extend(commands);
            }
            Err(e) => {
                warn!(
                    file = %path.display(),
                    parser = parser.name(),
                    error = %e,
                    "parse failed; file skipped"
                );
                outcome.skipped.push(path.to_path_buf());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn scan_concatenates_parsers_and_records_skips() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("package.json"),
            r#"{"scripts": {"build": "tsc", "test": "jest"}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("Makefile"), "all:\n\techo hi\n").unwrap();
        // Malformed JSON: the file is skipped, the run continues.
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/package.json"), "{nope").unwrap();

        let outcome = scan(dir.path(), &builtin_parsers());

        let texts: Vec<&str> = outcome.commands.iter().map(|c| c.text.as_str()).collect();
        assert!(texts.contains(&"npm run build"));
        assert!(texts.contains(&"npm run test"));
        assert!(texts.contains(&"make all"));
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].ends_with("sub/package.json"));
    }

    #[test]
    fn scan_skips_vendored_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("node_modules")).unwrap();
        fs::write(
            dir.path().join("node_modules/package.json"),
            r#"{"scripts": {"evil": "true"}}"#,
        )
        .unwrap();

        let outcome = scan(dir.path(), &builtin_parsers());
        assert!(outcome.commands.is_empty());
        assert!(outcome.skipped.is_empty());
    }
}
