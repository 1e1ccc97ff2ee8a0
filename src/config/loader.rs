// src/config/loader.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::cli::CliArgs;
use crate::config::container::ContainerConfig;
use crate::errors::{DomdError, Result};
use crate::ignore::IgnoreList;

/// Everything the engine needs for one run, assembled once and passed by
/// reference. There is deliberately no global mutable configuration.
#[derive(Debug)]
pub struct EngineConfig {
    /// Canonicalized scan root.
    pub root: PathBuf,
    pub ignore: IgnoreList,
    pub containers: ContainerConfig,
    pub default_timeout: Duration,
    pub jobs: usize,
    pub container_jobs: usize,
    /// Run every command in a container, matched entry or not.
    pub force_container: bool,
    /// Where TODO.md / DONE.md land.
    pub report_dir: PathBuf,
}

impl EngineConfig {
    /// Build the engine configuration from CLI arguments, loading the
    /// ignore and container-config files relative to the scan root.
    ///
    /// Malformed config files are fatal; missing ones are not.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let root = args
            .path
            .canonicalize()
            .map_err(|e| DomdError::ConfigError(format!(
                "scan root {}: {e}",
                args.path.display()
            )))?;
        if !root.is_dir() {
            return Err(DomdError::ConfigError(format!(
                "scan root {} is not a directory",
                root.display()
            )));
        }

        if args.jobs == 0 {
            return Err(DomdError::ConfigError("--jobs must be at least 1".into()));
        }
        if args.container_jobs == 0 {
            return Err(DomdError::ConfigError(
                "--container-jobs must be at least 1".into(),
            ));
        }
        if args.timeout == 0 {
            return Err(DomdError::ConfigError(
                "--timeout must be a positive number of seconds".into(),
            ));
        }

        let ignore = IgnoreList::load(&resolve(&root, &args.ignore_file))?;
        let containers = ContainerConfig::load(&resolve(&root, &args.container_config))?;

        info!(
            root = %root.display(),
            ignore_rules = ignore.len(),
            has_container_config = !containers.is_empty(),
            "engine configuration loaded"
        );

        Ok(Self {
            report_dir: args
                .report_dir
                .clone()
                .map(|dir| resolve(&root, &dir))
                .unwrap_or_else(|| root.clone()),
            root,
            ignore,
            containers,
            default_timeout: Duration::from_secs(args.timeout),
            jobs: args.jobs,
            container_jobs: args.container_jobs,
            force_container: args.container,
        })
    }

    /// Path of the persisted ledger for this scan root.
    pub fn ledger_path(&self) -> PathBuf {
        self.root.join(".domd").join("ledger.json")
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
