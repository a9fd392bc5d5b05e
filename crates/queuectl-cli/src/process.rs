//! `worker start` / `worker stop`: the only two Control Operations that
//! reach outside the Store into OS process management. Kept separate from
//! `control.rs` because they need the path to the current executable and a
//! signal primitive, not just the Repository/Registry traits.

use std::time::Duration;

use anyhow::{bail, Context};
use queuectl_core::store::WorkerRegistry;
use queuectl_core::worker::WorkerStatus;
use tracing::{info, warn};

/// Bounded wait for newly spawned workers to reach the registry.
const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(10);
/// Bounded wait for all workers to reach `stopped` after a stop request.
const STOP_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Spawn `count` detached worker processes (re-execs the current binary
/// with the hidden `worker-run` subcommand) and wait until all of them
/// have registered, or `REGISTRATION_TIMEOUT` elapses.
pub async fn worker_start<W: WorkerRegistry>(
    workers: &W,
    db_path: &str,
    count: u32,
) -> anyhow::Result<Vec<String>> {
    if count == 0 {
        bail!("--count must be at least 1");
    }

    let exe = std::env::current_exe().context("resolving current executable path")?;
    let before: std::collections::HashSet<String> = workers
        .list()
        .await?
        .into_iter()
        .map(|w| w.id)
        .collect();

    for _ in 0..count {
        spawn_detached(&exe, db_path)?;
    }

    let deadline = tokio::time::Instant::now() + REGISTRATION_TIMEOUT;
    loop {
        let rows = workers.list().await?;
        let registered: Vec<String> = rows
            .iter()
            .filter(|w| !before.contains(&w.id))
            .map(|w| w.id.clone())
            .collect();

        if registered.len() >= count as usize {
            info!(count, "workers registered");
            return Ok(registered);
        }

        if tokio::time::Instant::now() >= deadline {
            warn!(
                expected = count,
                registered = registered.len(),
                "timed out waiting for all workers to register"
            );
            return Ok(registered);
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn spawn_detached(exe: &std::path::Path, db_path: &str) -> anyhow::Result<()> {
    let mut cmd = tokio::process::Command::new(exe);
    cmd.arg("worker-run")
        .env("QUEUECTL_DB", db_path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null());

    // The child outlives this process's await of registration; it must not
    // be killed when the spawning `Child` handle is dropped.
    cmd.kill_on_drop(false);

    cmd.spawn().context("spawning worker process")?;
    Ok(())
}

/// Send every live worker its graceful shutdown signal, then wait (up to
/// `STOP_TIMEOUT`) for each to reach `stopped`. Workers still running past
/// the timeout are logged, not force-killed: `worker_stop` is cooperative.
pub async fn worker_stop<W: WorkerRegistry>(workers: &W) -> anyhow::Result<()> {
    let live: Vec<_> = workers
        .list()
        .await?
        .into_iter()
        .filter(|w| matches!(w.status, WorkerStatus::Starting | WorkerStatus::Running))
        .collect();

    if live.is_empty() {
        info!("no live workers to stop");
        return Ok(());
    }

    for worker in &live {
        signal_graceful_shutdown(worker.os_pid)?;
    }

    let ids: std::collections::HashSet<String> = live.iter().map(|w| w.id.clone()).collect();
    let deadline = tokio::time::Instant::now() + STOP_TIMEOUT;

    loop {
        let rows = workers.list().await?;
        let still_running = rows
            .iter()
            .filter(|w| ids.contains(&w.id) && w.status != WorkerStatus::Stopped)
            .count();

        if still_running == 0 {
            info!(stopped = live.len(), "all workers stopped");
            return Ok(());
        }

        if tokio::time::Instant::now() >= deadline {
            warn!(still_running, "worker_stop timed out; remaining workers considered lost");
            return Ok(());
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(unix)]
fn signal_graceful_shutdown(os_pid: i64) -> anyhow::Result<()> {
    // SAFETY: `kill` with a signal number and no side effects beyond
    // delivering the signal; `os_pid` is a plain integer read back from the
    // Worker Registry, not a raw pointer.
    let rc = unsafe { libc::kill(os_pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        // ESRCH: the process is already gone; nothing to signal.
        if err.raw_os_error() != Some(libc::ESRCH) {
            warn!(os_pid, error = %err, "failed to signal worker");
        }
    }
    Ok(())
}

#[cfg(windows)]
fn signal_graceful_shutdown(_os_pid: i64) -> anyhow::Result<()> {
    // Windows has no SIGTERM equivalent reachable from another process
    // without a shared IPC channel; cooperative shutdown there is left to
    // the worker's own Ctrl+C handler (run in the foreground).
    Ok(())
}
