// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod ignore;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod report;
pub mod runner;
pub mod scan;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::CliArgs;
use crate::config::EngineConfig;
use crate::errors::{DomdError, Result};
use crate::ledger::Ledger;
use crate::report::ReportSnapshot;
use crate::runner::Coordinator;

/// Outcome of one full run, used by `main.rs` to pick the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub detected: usize,
    pub working: usize,
    pub broken: usize,
}

impl RunSummary {
    /// CI-gate contract: success only when nothing is broken.
    pub fn all_working(&self) -> bool {
        self.broken == 0
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (ignore rules, container policies)
/// - the scanner and its registered parsers
/// - the execution coordinator and backends
/// - the ledger merge + persistence
/// - report emission
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<RunSummary> {
    let config = EngineConfig::from_args(&args)?;

    // Scan phase: every registered parser against every discovered file.
    let parsers = scan::builtin_parsers();
    let outcome = scan::scan(&config.root, &parsers);
    // `detected` counts unique commands, matching what gets dispatched
    // and what dry-run lists.
    let commands = runner::dedup_commands(outcome.commands);
    info!(
        commands = commands.len(),
        skipped_files = outcome.skipped.len(),
        "scan complete"
    );
    let detected = commands.len();

    if args.dry_run {
        print_dry_run(&commands, &config);
        return Ok(RunSummary { detected, working: 0, broken: 0 });
    }

    // Load the prior ledger up front: if persistence is broken we must
    // find out before running anything.
    let ledger_path = config.ledger_path();
    let previous = Ledger::load(&ledger_path)?;

    // Ctrl-C → cancel every in-flight backend.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            warn!("interrupt received; cancelling in-flight commands");
            cancel.cancel();
        });
    }

    let coordinator = Coordinator::new(&config, cancel.clone());
    let results = coordinator.run(commands, &config).await;

    if cancel.is_cancelled() {
        // An interrupted run must not supersede the previous ledger.
        return Err(DomdError::Other(anyhow::anyhow!(
            "run cancelled before completion; ledger left untouched"
        )));
    }

    let merged = Ledger::merge(&previous, &results);
    merged.store(&ledger_path)?;

    let snapshot = ReportSnapshot::from_results(&results);
    snapshot.write_markdown(&config.report_dir)?;

    let summary = RunSummary {
        detected,
        working: merged.working.len(),
        broken: merged.broken.len(),
    };
    info!(?summary, "run complete");
    Ok(summary)
}

/// List detected commands and what would happen to each, without
/// executing anything.
fn print_dry_run(commands: &[crate::model::Command], config: &EngineConfig) {
    println!("domd dry-run: {} unique command(s)", commands.len());
    for command in commands {
        let disposition = match config.ignore.matched_rule(command) {
            Some(rule) => format!("ignored by `{}`", rule.pattern),
            None => {
                let policy = config.containers.resolve_policy(
                    &command.text,
                    config.default_timeout,
                    config.force_container,
                );
                match policy.backend {
                    config::Backend::Local => "local".to_string(),
                    config::Backend::Container => format!("container ({})", policy.image),
                }
            }
        };
        println!("  - {}  [{}]  ({})", command.text, disposition, command.source.display());
    }
}
