// src/runner.rs

//! Execution coordinator.
//!
//! Drives the ignore filter and the backends across the full command
//! list:
//!
//! - deduplicates by fingerprint before dispatch (first discovery wins,
//!   later rediscoveries are dropped with a diagnostic)
//! - emits `Ignored` results without allocating any execution resource
//! - dispatches surviving commands concurrently, bounded by a worker
//!   pool, with container-backed commands additionally bounded by a
//!   smaller pool so the container runtime is never exhausted
//! - guarantees exactly one result per fingerprint
//!
//! Commands are mutually independent; completion order is irrelevant
//! because the ledger merge downstream is commutative over the result
//! set.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{Backend, EngineConfig, ExecutionPolicy};
use crate::exec::{ContainerBackend, ExecutionBackend, LocalBackend};
use crate::model::{Command, ExecutionResult};

/// A command paired with its run outcome.
pub type CommandResult = (Command, ExecutionResult);

pub struct Coordinator {
    local: Arc<dyn ExecutionBackend>,
    container: Arc<dyn ExecutionBackend>,
    jobs: Arc<Semaphore>,
    container_jobs: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Production coordinator with the real shell and Docker backends.
    pub fn new(config: &EngineConfig, cancel: CancellationToken) -> Self {
        Self::with_backends(
            Arc::new(LocalBackend::new(&config.root)),
            Arc::new(ContainerBackend::new()),
            config.jobs,
            config.container_jobs,
            cancel,
        )
    }

    /// Coordinator over arbitrary backends; tests inject fakes here.
    pub fn with_backends(
        local: Arc<dyn ExecutionBackend>,
        container: Arc<dyn ExecutionBackend>,
        jobs: usize,
        container_jobs: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            local,
            container,
            jobs: Arc::new(Semaphore::new(jobs)),
            container_jobs: Arc::new(Semaphore::new(container_jobs)),
            cancel,
        }
    }

    /// Run the full command list and collect one result per fingerprint.
    pub async fn run(&self, commands: Vec<Command>, config: &EngineConfig) -> Vec<CommandResult> {
        let commands = dedup_commands(commands);
        let total = commands.len();
        info!(total, "dispatching commands");

        let mut results: Vec<CommandResult> = Vec::with_capacity(total);
        let mut in_flight: JoinSet<CommandResult> = JoinSet::new();

        for command in commands {
            // The filter runs before any resource is allocated.
            if let Some(rule) = config.ignore.matched_rule(&command) {
                info!(
                    cmd = %command.text,
                    rule = %rule.pattern,
                    "command ignored by rule"
                );
                let result = ExecutionResult::ignored(command.fingerprint());
                results.push((command, result));
                continue;
            }

            let policy =
                config
                    .containers
                    .resolve_policy(&command.text, config.default_timeout, config.force_container);

            self.dispatch(command, policy, &mut in_flight);
        }

        while let Some(joined) = in_flight.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    // A panicked worker loses its command; surface loudly.
                    warn!(error = %e, "execution worker panicked");
                }
            }
        }

        results
    }

    fn dispatch(
        &self,
        command: Command,
        policy: ExecutionPolicy,
        in_flight: &mut JoinSet<CommandResult>,
    ) {
        let local = Arc::clone(&self.local);
        let container = Arc::clone(&self.container);
        let jobs = Arc::clone(&self.jobs);
        let container_jobs = Arc::clone(&self.container_jobs);
        let cancel = self.cancel.clone();

        in_flight.spawn(async move {
            // Permits are held for the whole execution; acquisition only
            // fails if the semaphore is closed, which never happens here.
            let _job = jobs.acquire().await.ok();
            let _container_job = match policy.backend {
                Backend::Container => container_jobs.acquire().await.ok(),
                Backend::Local => None,
            };

            debug!(cmd = %command.text, backend = ?policy.backend, "worker executing command");

            let result = match policy.backend {
                Backend::Local => local.execute(&command, &policy, cancel).await,
                Backend::Container => container.execute(&command, &policy, cancel).await,
            };

            (command, result)
        });
    }
}

/// Drop textually identical commands, whether rediscovered from the same
/// file or declared in several files.
///
/// First discovery wins; scan order is deterministic, so so is the
/// surviving command (and therefore its fingerprint).
pub fn dedup_commands(commands: Vec<Command>) -> Vec<Command> {
    let mut seen = HashSet::new();
    let mut unique = Vec::with_capacity(commands.len());
    for command in commands {
        if seen.insert(command.text.trim().to_string()) {
            unique.push(command);
        } else {
            debug!(
                cmd = %command.text,
                source = %command.source.display(),
                "duplicate discovery dropped; first discovery wins"
            );
        }
    }
    unique
}
