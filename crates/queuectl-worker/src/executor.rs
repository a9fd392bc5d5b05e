//! The shell-command executor: runs a job's command under a shell, enforces
//! a timeout, and captures stdout/stderr up to a fixed cap.
//!
//! Spawning follows the same shape as `codex-rs/core/src/spawn.rs`: stdin is
//! never inherited from the controlling terminal, stdout/stderr are piped
//! and captured, and the child is detached from the process the instant
//! it's no longer needed (`kill_on_drop`).

use queuectl_core::job::AttemptOutcome;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

/// Captured stdout/stderr are truncated past this cap.
pub const CAPTURE_CAP_BYTES: usize = 64 * 1024;

/// Grace period between SIGTERM and SIGKILL on timeout.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Conventional exit code recorded when a job is killed for exceeding its
/// timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// The result of running one attempt. `last_error` is `None` exactly when
/// `exit_code == Some(0)`.
pub struct ExecResult {
    pub outcome: AttemptOutcome,
    pub last_error: Option<String>,
}

impl ExecResult {
    pub fn is_success(&self) -> bool {
        self.outcome.exit_code == Some(0)
    }
}

/// Run `command` under a shell, enforcing `timeout`.
///
/// Stdout/stderr are drained on their own tasks from the moment the child
/// spawns, independent of the `tokio::time::timeout` below: if the timeout
/// future is dropped mid-flight, the capture tasks keep running until the
/// child actually exits, so a killed job's partial output isn't lost.
pub async fn run(command: &str, timeout: Duration) -> ExecResult {
    let mut cmd = build_command(command);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return ExecResult {
                outcome: AttemptOutcome {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: None,
                },
                last_error: Some(format!("failed to spawn command: {e}")),
            };
        }
    };

    let stdout_task = tokio::spawn(capture(child.stdout.take()));
    let stderr_task = tokio::spawn(capture(child.stderr.take()));

    let (exit_code, last_error) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(status) => {
            let exit_code = status.ok().and_then(|s| s.code());
            let last_error = if exit_code == Some(0) {
                None
            } else {
                Some(format!("command exited with status {exit_code:?}"))
            };
            (exit_code, last_error)
        }
        Err(_) => {
            kill_with_grace(&mut child).await;
            (Some(TIMEOUT_EXIT_CODE), Some("timeout".to_string()))
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    ExecResult {
        outcome: AttemptOutcome {
            stdout,
            stderr,
            exit_code,
        },
        last_error,
    }
}

fn build_command(command: &str) -> Command {
    #[cfg(unix)]
    let mut cmd = {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };
    #[cfg(windows)]
    let mut cmd = {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    };

    // Never inherit stdin from the controlling terminal.
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);
    cmd
}

async fn capture(pipe: Option<impl AsyncRead + Unpin>) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };

    let mut buf = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];
    let mut truncated = false;

    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() + n > CAPTURE_CAP_BYTES {
                    let remaining = CAPTURE_CAP_BYTES.saturating_sub(buf.len());
                    buf.extend_from_slice(&chunk[..remaining]);
                    truncated = true;
                    // Keep draining the pipe so the child isn't blocked
                    // writing into a full OS buffer, but stop storing.
                    let mut sink = [0u8; 4096];
                    while pipe.read(&mut sink).await.unwrap_or(0) > 0 {}
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            Err(_) => break,
        }
    }

    let mut out = String::from_utf8_lossy(&buf).into_owned();
    if truncated {
        out.push_str("\n...[truncated]");
    }
    out
}

/// SIGTERM, then SIGKILL after `KILL_GRACE` if the child hasn't exited. The
/// stdout/stderr capture tasks spawned in `run` drain independently and are
/// not touched here.
async fn kill_with_grace(child: &mut Child) {
    #[cfg(unix)]
    if let Some(pid) = child.id() {
        unsafe {
            libc::kill(pid as libc::pid_t, libc::SIGTERM);
        }
    }
    #[cfg(windows)]
    let _ = child.start_kill();

    if tokio::time::timeout(KILL_GRACE, child.wait()).await.is_err() {
        let _ = child.start_kill();
        let _ = child.wait().await;
    }
}
