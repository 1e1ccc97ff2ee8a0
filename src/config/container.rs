// src/config/container.rs

//! Container configuration file (`.domd.yaml`).
//!
//! Top-level keys are command patterns; a key containing `*` matches as a
//! glob, anything else matches exactly. Each value describes the container
//! policy for matching commands:
//!
//! ```yaml
//! "npm run *":
//!   image: node:20-slim
//!   workdir: /app
//!   volumes:
//!     ./: /app
//!   environment:
//!     NODE_ENV: "${NODE_ENV:-test}"
//! "make release":
//!   image: rust:1.80
//!   privileged: true
//! ```
//!
//! Resolution picks at most one entry per command: an exact key beats any
//! glob key, and among glob matches the longest pattern wins. Environment
//! values support shell-style `${VAR:-default}` expansion, resolved
//! against the host environment at load time.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use globset::GlobBuilder;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{DomdError, Result};

pub const DEFAULT_IMAGE: &str = "python:3.9-slim";
pub const DEFAULT_WORKDIR: &str = "/app";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Which strategy runs a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Local,
    Container,
}

/// Resolved isolation and resource policy for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPolicy {
    pub backend: Backend,
    pub image: String,
    pub workdir: String,
    /// host path → container path
    pub volumes: BTreeMap<String, String>,
    pub environment: BTreeMap<String, String>,
    /// `"host:container"` publish specs.
    pub ports: Vec<String>,
    pub privileged: bool,
    /// When false the container runs with `--network none`.
    pub network: bool,
    pub timeout: Duration,
}

impl ExecutionPolicy {
    /// Local execution with the given timeout; container fields unused.
    pub fn local(timeout: Duration) -> Self {
        Self {
            backend: Backend::Local,
            image: String::new(),
            workdir: String::new(),
            volumes: BTreeMap::new(),
            environment: BTreeMap::new(),
            ports: Vec::new(),
            privileged: false,
            network: false,
            timeout,
        }
    }

    /// Default container policy for commands forced into a container
    /// without a matching config entry.
    pub fn default_container(timeout: Duration) -> Self {
        Self {
            backend: Backend::Container,
            image: DEFAULT_IMAGE.to_string(),
            workdir: DEFAULT_WORKDIR.to_string(),
            volumes: BTreeMap::new(),
            environment: BTreeMap::new(),
            ports: Vec::new(),
            privileged: false,
            network: false,
            timeout,
        }
    }
}

/// One entry as written in the YAML file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ContainerEntry {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub volumes: BTreeMap<String, String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub privileged: bool,
    #[serde(default)]
    pub network: bool,
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Parsed container configuration: ordered pattern → entry pairs.
#[derive(Debug, Default)]
pub struct ContainerConfig {
    entries: Vec<(String, ContainerEntry)>,
}

impl ContainerConfig {
    /// Parse YAML contents, expanding `${VAR:-default}` references in
    /// environment values against the host environment.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, ContainerEntry> = serde_yaml::from_str(contents)?;
        let mut entries = Vec::with_capacity(raw.len());
        for (pattern, mut entry) in raw {
            // Reject patterns that would never compile later.
            if pattern.contains('*') {
                GlobBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid container-config pattern: {pattern}"))?;
            }
            for value in entry.environment.values_mut() {
                *value = expand_env(value);
            }
            entries.push((pattern, entry));
        }
        Ok(Self { entries })
    }

    /// Load from a file path; a missing file yields an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!(path = %path.display(), "no container config file");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| DomdError::ConfigError(format!("reading {}: {e}", path.display())))?;
        Self::from_yaml(&contents)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the most specific entry matching a command, if any.
    ///
    /// Exact key match wins over glob match; among glob matches the
    /// longest pattern wins.
    pub fn resolve_entry(&self, command_text: &str) -> Option<&ContainerEntry> {
        let text = command_text.trim();

        if let Some((_, entry)) = self
            .entries
            .iter()
            .find(|(pattern, _)| !pattern.contains('*') && pattern == text)
        {
            return Some(entry);
        }

        self.entries
            .iter()
            .filter(|(pattern, _)| pattern.contains('*') && glob_matches(pattern, text))
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, entry)| entry)
    }

    /// Resolve the full execution policy for a command.
    ///
    /// - A matching entry always means container execution.
    /// - With `force_container`, unmatched commands fall back to the
    ///   default image instead of running locally.
    pub fn resolve_policy(
        &self,
        command_text: &str,
        default_timeout: Duration,
        force_container: bool,
    ) -> ExecutionPolicy {
        match self.resolve_entry(command_text) {
            Some(entry) => ExecutionPolicy {
                backend: Backend::Container,
                image: entry.image.clone().unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
                workdir: entry
                    .workdir
                    .clone()
                    .unwrap_or_else(|| DEFAULT_WORKDIR.to_string()),
                volumes: entry.volumes.clone(),
                environment: entry.environment.clone(),
                ports: entry.ports.clone(),
                privileged: entry.privileged,
                network: entry.network,
                timeout: entry
                    .timeout
                    .map(Duration::from_secs)
                    .unwrap_or(default_timeout),
            },
            None if force_container => ExecutionPolicy::default_container(default_timeout),
            None => ExecutionPolicy::local(default_timeout),
        }
    }
}

fn glob_matches(pattern: &str, text: &str) -> bool {
    GlobBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map(|g| g.compile_matcher().is_match(text))
        .unwrap_or(false)
}

/// Expand `${VAR}` and `${VAR:-default}` references against the host
/// environment. Unset variables without a default expand to empty.
pub fn expand_env(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let inner = &after[..end];
                let (name, default) = match inner.split_once(":-") {
                    Some((name, default)) => (name, Some(default)),
                    None => (inner, None),
                };
                match std::env::var(name) {
                    Ok(v) if !v.is_empty() => out.push_str(&v),
                    _ => out.push_str(default.unwrap_or("")),
                }
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated reference; keep the literal text.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
"npm run *":
  image: node:20-slim
  workdir: /workspace
  volumes:
    ./: /workspace
"npm run build":
  image: node:20
"make *":
  privileged: true
"#;

    #[test]
    fn exact_key_beats_glob_key() {
        let cfg = ContainerConfig::from_yaml(SAMPLE).unwrap();
        let entry = cfg.resolve_entry("npm run build").unwrap();
        assert_eq!(entry.image.as_deref(), Some("node:20"));
    }

    #[test]
    fn glob_key_applies_to_other_commands() {
        let cfg = ContainerConfig::from_yaml(SAMPLE).unwrap();
        let entry = cfg.resolve_entry("npm run lint").unwrap();
        assert_eq!(entry.image.as_deref(), Some("node:20-slim"));
        assert_eq!(entry.workdir.as_deref(), Some("/workspace"));
    }

    #[test]
    fn longest_glob_wins() {
        let yaml = r#"
"npm *":
  image: a
"npm run *":
  image: b
"#;
        let cfg = ContainerConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            cfg.resolve_entry("npm run serve").unwrap().image.as_deref(),
            Some("b")
        );
    }

    #[test]
    fn unmatched_command_has_no_entry() {
        let cfg = ContainerConfig::from_yaml(SAMPLE).unwrap();
        assert!(cfg.resolve_entry("cargo test").is_none());
    }

    #[test]
    fn unmatched_runs_local_unless_forced() {
        let cfg = ContainerConfig::from_yaml(SAMPLE).unwrap();
        let timeout = Duration::from_secs(30);

        let local = cfg.resolve_policy("cargo test", timeout, false);
        assert_eq!(local.backend, Backend::Local);
        assert_eq!(local.timeout, timeout);

        let forced = cfg.resolve_policy("cargo test", timeout, true);
        assert_eq!(forced.backend, Backend::Container);
        assert_eq!(forced.image, DEFAULT_IMAGE);
        assert_eq!(forced.workdir, DEFAULT_WORKDIR);
    }

    #[test]
    fn matched_policy_fills_defaults() {
        let yaml = r#"
"pytest":
  environment:
    CI: "1"
"#;
        let cfg = ContainerConfig::from_yaml(yaml).unwrap();
        let policy = cfg.resolve_policy("pytest", Duration::from_secs(10), false);
        assert_eq!(policy.backend, Backend::Container);
        assert_eq!(policy.image, DEFAULT_IMAGE);
        assert_eq!(policy.workdir, DEFAULT_WORKDIR);
        assert_eq!(policy.environment.get("CI").map(String::as_str), Some("1"));
    }

    #[test]
    fn per_entry_timeout_overrides_default() {
        let yaml = r#"
"slow job":
  timeout: 300
"#;
        let cfg = ContainerConfig::from_yaml(yaml).unwrap();
        let policy = cfg.resolve_policy("slow job", Duration::from_secs(10), false);
        assert_eq!(policy.timeout, Duration::from_secs(300));
    }

    #[test]
    fn env_expansion_uses_default_when_unset() {
        // Var names are unique to this test; no other thread touches them.
        unsafe { std::env::remove_var("DOMD_TEST_UNSET_VAR") };
        assert_eq!(expand_env("${DOMD_TEST_UNSET_VAR:-fallback}"), "fallback");
        assert_eq!(expand_env("${DOMD_TEST_UNSET_VAR}"), "");
    }

    #[test]
    fn env_expansion_prefers_host_value() {
        unsafe { std::env::set_var("DOMD_TEST_SET_VAR", "from-host") };
        assert_eq!(
            expand_env("prefix-${DOMD_TEST_SET_VAR:-fallback}-suffix"),
            "prefix-from-host-suffix"
        );
        unsafe { std::env::remove_var("DOMD_TEST_SET_VAR") };
    }

    #[test]
    fn unterminated_reference_is_kept_literal() {
        assert_eq!(expand_env("${OOPS"), "${OOPS");
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let yaml = r#"
"npm test":
  imagee: typo
"#;
        assert!(ContainerConfig::from_yaml(yaml).is_err());
    }
}
