// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `domd`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "domd",
    version,
    about = "Detect project commands, run them, and track which ones are broken.",
    long_about = None
)]
pub struct CliArgs {
    /// Project directory to scan.
    ///
    /// Default: the current working directory.
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Path to the ignore file, relative to the scan root.
    #[arg(long, value_name = "FILE", default_value = ".doignore")]
    pub ignore_file: PathBuf,

    /// Path to the container configuration file (YAML), relative to the
    /// scan root. If the file does not exist, no container policies apply.
    #[arg(long, value_name = "FILE", default_value = ".domd.yaml")]
    pub container_config: PathBuf,

    /// Per-command timeout in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub timeout: u64,

    /// Maximum number of commands executing concurrently.
    #[arg(long, value_name = "N", default_value_t = 4)]
    pub jobs: usize,

    /// Maximum number of container-backed commands executing concurrently.
    #[arg(long, value_name = "N", default_value_t = 2)]
    pub container_jobs: usize,

    /// Run every command in a container, even ones without a config entry.
    #[arg(long)]
    pub container: bool,

    /// Detect and filter commands, print what would run, execute nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Directory where TODO.md / DONE.md are written.
    ///
    /// Default: the scan root.
    #[arg(long, value_name = "DIR")]
    pub report_dir: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DOMD_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
