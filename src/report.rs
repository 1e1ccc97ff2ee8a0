// src/report.rs

//! Read-only report boundary.
//!
//! After the ledger merge, the engine exposes one immutable snapshot of
//! the run: working and broken commands, each paired with its result.
//! The bundled renderer turns that snapshot into `TODO.md` (broken) and
//! `DONE.md` (working); anything fancier lives outside the engine.

use std::fmt::Write as _;
use std::path::Path;

use tracing::info;

use crate::errors::Result;
use crate::model::{Command, ExecutionResult, ExecutionStatus};
use crate::runner::CommandResult;

/// One command with its outcome, as exposed to renderers.
#[derive(Debug, Clone)]
pub struct ReportItem {
    pub command: Command,
    pub result: ExecutionResult,
}

/// Snapshot of a completed run: the working/broken partition with full
/// command and result detail. Built once, after all results are in.
#[derive(Debug, Clone, Default)]
pub struct ReportSnapshot {
    pub working: Vec<ReportItem>,
    pub broken: Vec<ReportItem>,
}

impl ReportSnapshot {
    /// Partition this run's results. Ignored and parse-skipped commands
    /// appear in neither list. Ordering is by fingerprint, so the output
    /// is stable across runs.
    pub fn from_results(results: &[CommandResult]) -> Self {
        let mut snapshot = Self::default();
        for (command, result) in results {
            let item = ReportItem { command: command.clone(), result: result.clone() };
            match result.status {
                ExecutionStatus::Success => snapshot.working.push(item),
                ExecutionStatus::Failure | ExecutionStatus::Timeout => snapshot.broken.push(item),
                ExecutionStatus::Ignored | ExecutionStatus::ParseSkipped => {}
            }
        }
        snapshot.working.sort_by_key(|item| item.result.fingerprint);
        snapshot.broken.sort_by_key(|item| item.result.fingerprint);
        snapshot
    }

    /// Render `TODO.md` and `DONE.md` into the given directory.
    pub fn write_markdown(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join("TODO.md"), self.render_todo())?;
        std::fs::write(dir.join("DONE.md"), self.render_done())?;
        info!(
            dir = %dir.display(),
            broken = self.broken.len(),
            working = self.working.len(),
            "reports written"
        );
        Ok(())
    }

    fn render_todo(&self) -> String {
        let mut out = String::from("# TODO: broken commands\n\n");
        if self.broken.is_empty() {
            out.push_str("Nothing is broken. All detected commands succeed.\n");
            return out;
        }
        for item in &self.broken {
            let label = match item.result.status {
                ExecutionStatus::Timeout => "timed out".to_string(),
                _ => format!("exit code {}", item.result.return_code),
            };
            let _ = writeln!(out, "## `{}`\n", item.command.text);
            let _ = writeln!(out, "- source: `{}`", item.command.source.display());
            let _ = writeln!(out, "- status: {label}");
            if !item.command.description.is_empty() {
                let _ = writeln!(out, "- description: {}", item.command.description);
            }
            let stderr_tail = tail_lines(&item.result.stderr, 20);
            if !stderr_tail.is_empty() {
                let _ = writeln!(out, "\n```\n{stderr_tail}\n```");
            }
            out.push('\n');
        }
        out
    }

    fn render_done(&self) -> String {
        let mut out = String::from("# DONE: working commands\n\n");
        if self.working.is_empty() {
            out.push_str("No working commands recorded.\n");
            return out;
        }
        for item in &self.working {
            let _ = writeln!(
                out,
                "- `{}` ({})",
                item.command.text,
                item.command.source.display()
            );
        }
        out
    }
}

fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
