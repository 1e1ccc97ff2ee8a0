// src/ignore.rs

//! Ignore rules loaded from `.doignore`.
//!
//! One rule per line; blank lines and `#` comments are skipped. A line
//! containing `*` is a glob rule, anything else is an exact rule. All
//! matching is case-insensitive against the trimmed command text, and a
//! glob is anchored to the full string (`*serve*` matches `serve`
//! anywhere).
//!
//! Matching is pure and happens before any execution resource is
//! allocated; an ignored command never reaches a backend.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use crate::errors::{DomdError, Result};
use crate::model::Command;

/// Kind of one ignore rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Exact,
    Glob,
}

/// One line of the ignore configuration.
pub struct IgnoreRule {
    pub kind: RuleKind,
    /// Case-folded pattern as written in the file.
    pub pattern: String,
    matcher: Option<GlobMatcher>,
}

impl fmt::Debug for IgnoreRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IgnoreRule")
            .field("kind", &self.kind)
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl IgnoreRule {
    /// Build a rule from one non-comment line.
    pub fn parse(line: &str) -> Result<Self> {
        let pattern = line.trim().to_lowercase();
        if pattern.contains('*') {
            let matcher = GlobBuilder::new(&pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("invalid ignore glob: {pattern}"))?
                .compile_matcher();
            Ok(Self { kind: RuleKind::Glob, pattern, matcher: Some(matcher) })
        } else {
            Ok(Self { kind: RuleKind::Exact, pattern, matcher: None })
        }
    }

    /// Whether this rule matches the given command text.
    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim();
        match self.kind {
            RuleKind::Exact => text.to_lowercase() == self.pattern,
            RuleKind::Glob => self
                .matcher
                .as_ref()
                .is_some_and(|m| m.is_match(text.to_lowercase())),
        }
    }
}

/// Flat ordered list of ignore rules.
///
/// Order only affects which rule is reported as the match; the
/// ignored-or-not outcome is order-independent.
#[derive(Debug, Default)]
pub struct IgnoreList {
    rules: Vec<IgnoreRule>,
}

impl IgnoreList {
    pub fn new(rules: Vec<IgnoreRule>) -> Self {
        Self { rules }
    }

    /// Parse the contents of an ignore file.
    pub fn from_contents(contents: &str) -> Result<Self> {
        let mut rules = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            rules.push(IgnoreRule::parse(line)?);
        }
        Ok(Self { rules })
    }

    /// Load rules from a file path. A missing file yields an empty list;
    /// an unreadable or malformed file is a fatal configuration error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!(path = %path.display(), "no ignore file; nothing will be ignored");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DomdError::ConfigError(format!("reading {}: {e}", path.display())))?;
        Self::from_contents(&contents)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Return the first rule matching the command, if any. Pure.
    pub fn matched_rule(&self, command: &Command) -> Option<&IgnoreRule> {
        self.rules.iter().find(|rule| rule.matches(&command.text))
    }

    /// Whether the command should be skipped before execution.
    pub fn should_ignore(&self, command: &Command) -> bool {
        self.matched_rule(command).is_some()
    }
}
