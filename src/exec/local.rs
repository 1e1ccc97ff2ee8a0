// src/exec/local.rs

//! Local shell execution backend.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::time::Instant;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command as ProcessCommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ExecutionPolicy;
use crate::exec::ExecutionBackend;
use crate::model::{cap_output, Command, ExecutionResult, ExecutionStatus, unix_now};

/// Runs a command as a single shell invocation in the scan root (or the
/// command's own working directory), with the policy environment merged
/// over the inherited process environment.
///
/// On timeout the whole process group is killed, the result is `Timeout`
/// with return code `-1`, and whatever output was captured so far is
/// retained.
pub struct LocalBackend {
    workdir: PathBuf,
}

impl LocalBackend {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self { workdir: workdir.into() }
    }
}

impl ExecutionBackend for LocalBackend {
    fn execute<'a>(
        &'a self,
        command: &'a Command,
        policy: &'a ExecutionPolicy,
        cancel: CancellationToken,
    ) -> Pin<Box<dyn Future<Output = ExecutionResult> + Send + 'a>> {
        Box::pin(self.run(command, policy, cancel))
    }
}

impl LocalBackend {
    async fn run(
        &self,
        command: &Command,
        policy: &ExecutionPolicy,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let fingerprint = command.fingerprint();
        let started = Instant::now();

        debug!(
            fp = %fingerprint,
            cmd = %command.text,
            timeout_secs = policy.timeout.as_secs(),
            "starting local command"
        );

        let mut cmd = shell_command(&command.text);
        cmd.current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Explicit variables win over the inherited environment.
        for (key, value) in &policy.environment {
            cmd.env(key, value);
        }
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(fp = %fingerprint, error = %e, "failed to spawn shell");
                let mut result = ExecutionResult::failure_with_diagnostic(
                    fingerprint,
                    format!("failed to spawn shell for `{}`: {e}", command.text),
                );
                result.duration = started.elapsed();
                return result;
            }
        };

        // Pump both streams concurrently so pipe buffers never fill.
        let stdout_task = tokio::spawn(read_stream(child.stdout.take()));
        let stderr_task = tokio::spawn(read_stream(child.stderr.take()));

        let (status, timed_out, cancelled) = tokio::select! {
            status = child.wait() => (status.ok(), false, false),
            _ = tokio::time::sleep(policy.timeout) => {
                info!(fp = %fingerprint, cmd = %command.text, "command timed out; killing process group");
                kill_group(&mut child).await;
                (child.wait().await.ok(), true, false)
            }
            _ = cancel.cancelled() => {
                info!(fp = %fingerprint, cmd = %command.text, "run cancelled; killing process group");
                kill_group(&mut child).await;
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
                    "command exceeded timeout of {}s",
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

/// Build the invocation for a command string.
///
/// Commands without shell metacharacters run as a plain argument vector,
/// avoiding quoting ambiguity. Anything that textually needs a shell
/// (pipes, redirects, expansions) goes through `sh -c`; commands
/// originate from the user's own project files.
fn shell_command(text: &str) -> ProcessCommand {
    let text = text.trim();
    if !needs_shell(text) {
        let mut parts = text.split_whitespace();
        if let Some(program) = parts.next() {
            let mut c = ProcessCommand::new(program);
            c.args(parts);
            return c;
        }
    }
    if cfg!(windows) {
        let mut c = ProcessCommand::new("cmd");
        c.arg("/C").arg(text);
        c
    } else {
        let mut c = ProcessCommand::new("sh");
        c.arg("-c").arg(text);
        c
    }
}

/// Whether the command text relies on shell interpretation.
fn needs_shell(text: &str) -> bool {
    if text.is_empty()
        || text.contains([
            '|', '&', ';', '<', '>', '$', '`', '"', '\'', '\\', '*', '?', '~', '#', '(', ')',
            '{', '}', '[', ']', '!', '\n',
        ])
    {
        return true;
    }
    // Builtins have no binary to exec.
    const BUILTINS: &[&str] = &["cd", "exit", "export", "set", "source", "."];
    let first = text.split_whitespace().next().unwrap_or("");
    BUILTINS.contains(&first) || first.contains('=')
}

async fn read_stream(stream: Option<impl tokio::io::AsyncRead + Unpin>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut stream) = stream {
        let _ = stream.read_to_end(&mut buf).await;
    }
    buf
}

/// Forcibly terminate the child's process group.
///
/// Shell commands routinely spawn their own children (pipelines, `&&`
/// chains); killing only the direct child would leave those orphaned.
#[cfg(unix)]
async fn kill_group(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let pgid = Pid::from_raw(pid as i32);
        if let Err(e) = killpg(pgid, Signal::SIGKILL) {
            debug!(pid, error = %e, "killpg failed; falling back to child kill");
            let _ = child.kill().await;
        }
    } else {
        let _ = child.kill().await;
    }
}

#[cfg(not(unix))]
async fn kill_group(child: &mut Child) {
    let _ = child.kill().await;
}
