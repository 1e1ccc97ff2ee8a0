// src/exec/container.rs

//! Ephemeral Docker container execution backend.
//!
//! The Docker CLI is used for the whole container lifecycle: one
//! `docker run --rm` per command, force-removed on timeout or
//! cancellation so no container ever outlives its run. If the Docker
//! daemon is unreachable the command fails with a diagnostic; the
//! backend never silently falls back to local execution, because
//! isolation was the user's stated requirement.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tokio::process::Command as ProcessCommand;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExecutionPolicy;
use crate::exec::ExecutionBackend;
use crate::model::{cap_output, Command, ExecutionResult, ExecutionStatus, Fingerprint, unix_now};

pub struct ContainerBackend {
    /// The docker CLI binary. Swapped for a stub in tests.
    bin: PathBuf,
    /// Daemon reachability, probed once per run.
    probe: OnceCell<std::result::Result<(), String>>,
    /// Distinguishes containers when the same command runs twice.
    nonce: AtomicU64,
}

impl Default for ContainerBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerBackend {
    pub fn new() -> Self {
        Self::with_cli(PathBuf::from("docker"))
    }

    pub fn with_cli(bin: PathBuf) -> Self {
        Self { bin, probe: OnceCell::new(), nonce: AtomicU64::new(0) }
    }

    async fn runtime_available(&self) -> std::result::Result<(), String> {
        self.probe
            .get_or_init(|| async {
                match run_docker(&self.bin, &["version", "--format", "{{.Server.Version}}"]).await {
                    Ok(version) => {
                        debug!(version = %version, "docker daemon reachable");
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            })
            .await
            .clone()
    }

    fn container_name(&self, fingerprint: Fingerprint) -> String {
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        format!("domd-{}-{nonce}", fingerprint.short())
    }
}

impl ExecutionBackend for ContainerBackend {
    fn execute<'a>(
        &'a self,
        command: &'a Command,
        policy: &'a ExecutionPolicy,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
        Box::pin(self.run(command, policy, cancel))
    }
}

impl ContainerBackend {
    async fn run(
        &self,
        command: &Command,
        policy: &ExecutionPolicy,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let fingerprint = command.fingerprint();
        let started = Instant::now();

        if let Err(e) = self.runtime_available().await {
            warn!(fp = %fingerprint, error = %e, "container runtime unreachable");
            let mut result = ExecutionResult::failure_with_diagnostic(
                fingerprint,
                format!("container runtime unreachable: {e}"),
            );
            result.duration = started.elapsed();
            return result;
        }

        let name = self.container_name(fingerprint);
        let args = docker_run_args(&name, &command.text, policy);

        info!(
            fp = %fingerprint,
            container = %name,
            image = %policy.image,
            cmd = %command.text,
            "starting container"
        );

        let mut cmd = ProcessCommand::new(&self.bin);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let mut result = ExecutionResult::failure_with_diagnostic(
                    fingerprint,
                    format!("failed to exec docker: {e}"),
                );
                result.duration = started.elapsed();
                return result;
            }
        };

        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let (status, timed_out, cancelled) = tokio::select! {
            status = child.wait() => (status.ok(), false, false),
            _ = tokio::time::sleep(policy.timeout) => {
                info!(container = %name, "container timed out; force-removing");
                force_remove(&self.bin, &name).await;
                (child.wait().await.ok(), true, false)
            }
            _ = cancel.cancelled() => {
                info!(container = %name, "run cancelled; force-removing container");
                force_remove(&self.bin, &name).await;
                (child.wait().await.ok(), false, true)
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        let (result_status, return_code, extra_diag) = if timed_out {
            (
                ExecutionStatus::Timeout,
                -1,
                Some(format!(
                    "command exceeded timeout of {}s in container {name}",
                    policy.timeout.as_secs()
                )),
            )
        } else if cancelled {
            (
                ExecutionStatus::Failure,
                -1,
                Some("run cancelled before completion".to_string()),
            )
        } else {
            let code = status.and_then(|s| s.code()).unwrap_or(-1);
            let result_status = if code == 0 {
                ExecutionStatus::Success
            } else {
                ExecutionStatus::Failure
            };
            (result_status, code, None)
        };

        let mut stderr_text = cap_output(&stderr);
        if let Some(diag) = extra_diag {
            if !stderr_text.is_empty() {
                stderr_text.push('\n');
            }
            stderr_text.push_str(&diag);
        }

        ExecutionResult {
            fingerprint,
            status: result_status,
            return_code,
            stdout: cap_output(&stdout),
            stderr: stderr_text,
            duration: started.elapsed(),
            executed_at: unix_now(),
        }
    }
}

/// Build the full `docker run` argument vector for one command.
///
/// `--rm` removes the container on normal exit; the timeout and
/// cancellation paths additionally issue `docker rm -f` so the lifecycle
/// never leaks regardless of outcome.
pub fn docker_run_args(name: &str, command_text: &str, policy: &ExecutionPolicy) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        name.to_string(),
    ];
    if !policy.workdir.is_empty() {
        args.push("-w".to_string());
        args.push(policy.workdir.clone());
    }
    for (host, container) in &policy.volumes {
        args.push("-v".to_string());
        args.push(format!("{host}:{container}"));
    }
    for (key, value) in &policy.environment {
        args.push("-e".to_string());
        args.push(format!("{key}={value}"));
    }
    for port in &policy.ports {
        args.push("-p".to_string());
        args.push(port.clone());
    }
    if policy.privileged {
        args.push("--privileged".to_string());
    }
    if !policy.network {
        args.push("--network".to_string());
        args.push("none".to_string());
    }
    args.push(policy.image.clone());
    args.push("sh".to_string());
    args.push("-c".to_string());
    args.push(command_text.to_string());
    args
}

/// Argument vector for tearing down a container by name.
pub fn docker_rm_args(name: &str) -> Vec<String> {
    vec!["rm".to_string(), "-f".to_string(), name.to_string()]
}

async fn force_remove(bin: &Path, name: &str) {
    let args = docker_rm_args(name);
    let argv: Vec<&str> = args.iter().map(String::as_str).collect();
    if let Err(e) = run_docker(bin, &argv).await {
        // The container may already be gone thanks to `--rm`.
        debug!(container = %name, error = %e, "container removal");
    }
}

async fn run_docker(bin: &Path, args: &[&str]) -> std::result::Result<String, String> {
    let output = ProcessCommand::new(bin)
        .args(args)
        .output()
        .await
        .map_err(|e| format!("failed to exec docker: {e}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(format!(
            "docker {} failed: {}",
            args.first().unwrap_or(&""),
            stderr.trim()
        ))
    }
}

async fn read_stream(stream: Option<impl tokio::io::AsyncRead + Unpin>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    buf
}
