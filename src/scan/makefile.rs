// src/scan/makefile.rs

//! Makefile targets.
//!
//! Detection only needs target names, so this reads the file line by line
//! instead of parsing make syntax: a line starting in column zero with an
//! identifier followed by `:` is a target. Pattern rules, special targets
//! (`.PHONY` and friends) and variable assignments are skipped.

use std::path::Path;

use anyhow::Context;

use crate::errors::Result;
use crate::model::Command;
use crate::scan::Parser;

pub struct MakefileParser;

impl Parser for MakefileParser {
    fn name(&self) -> &'static str {
        "makefile"
    }

    fn can_parse(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n == "Makefile" || n == "makefile" || n == "GNUmakefile")
    }

    fn parse_commands(&self, path: &Path) -> Result<Vec<Command>> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;

        let mut commands = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            let Some(target) = target_name(line) else {
                continue;
            };
            commands.push(
                Command::new(format!("make {target}"), path)
                    .with_description(format!("Make target: {target}"))
                    .with_metadata("line", (lineno + 1).to_string()),
            );
        }
        Ok(commands)
    }
}

/// Extract a runnable target name from one Makefile line, if any.
fn target_name(line: &str) -> Option<&str> {
    // Recipe lines are tab-indented; comments and blanks carry nothing.
    if line.starts_with(['\t', '#']) || line.trim().is_empty() {
        return None;
    }
    let head = line.split(':').next()?;
    if head == line {
        // No colon at all (e.g. a directive or continuation).
        return None;
    }
    let head = head.trim();
    // `:=` and friends are variable assignments, not rules.
    if line[head.len()..].starts_with(":=") || line.contains(":=") {
        return None;
    }
    let runnable = !head.is_empty()
        && !head.starts_with('.')
        && !head.contains(['%', '$', '(', ' ', '=']);
    runnable.then_some(head)
}
