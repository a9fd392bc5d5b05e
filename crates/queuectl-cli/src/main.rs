//! `queuectl` binary: wires the `clap` argv surface to Control Operations
//! over a `queuectl-store::connect`-opened SQLite pool, the same
//! thin-`main`-plus-`init_logging` shape used by `fraiseql-cli`'s
//! `main.rs`.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use queuectl_cli::cli::{Cli, Commands, ConfigCommands, DlqCommands, WorkerCommands};
use queuectl_cli::control::QueueCtl;
use queuectl_cli::{output, process};
use queuectl_core::error::QueueCtlError;
use queuectl_store::{connect, SqliteConfigStore, SqliteJobStore, SqliteWorkerRegistry};
use queuectl_worker::WorkerRuntime;

fn db_path() -> String {
    std::env::var("QUEUECTL_DB").unwrap_or_else(|_| "./queuectl.db".to_string())
}

fn init_logging(debug: bool) {
    let default_filter = if debug { "queuectl=debug" } else { "queuectl=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.debug);

    let path = db_path();
    let pool = match connect(&path).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("failed to open store at {path}: {e:#}");
            std::process::exit(1);
        }
    };

    let jobs = Arc::new(SqliteJobStore::new(pool.clone()));
    let workers = Arc::new(SqliteWorkerRegistry::new(pool.clone()));
    let config = Arc::new(SqliteConfigStore::new(pool));
    let ctl = QueueCtl::new(jobs.clone(), workers.clone(), config.clone());

    let json = cli.json;
    let exit_code = match cli.command {
        Commands::WorkerRun => {
            run_worker_foreground(jobs, workers, config).await;
            0
        }
        command => run_command(&ctl, &path, command, json).await,
    };

    std::process::exit(exit_code);
}

async fn run_command<J, W, C>(
    ctl: &QueueCtl<J, W, C>,
    db_path: &str,
    command: Commands,
    json: bool,
) -> i32
where
    J: queuectl_core::store::JobStore,
    W: queuectl_core::store::WorkerRegistry,
    C: queuectl_core::store::ConfigStore,
{
    match command {
        Commands::Enqueue { json: raw } => match ctl.enqueue(&raw).await {
            Ok(job) => {
                output::job_id(&job);
                0
            }
            Err(e) => report(e),
        },

        Commands::List { state, offset, limit } => {
            match ctl.list(state.as_deref(), offset, limit).await {
                Ok(rows) => {
                    output::jobs(&rows, json);
                    0
                }
                Err(e) => report(e),
            }
        }

        Commands::Status => match ctl.status().await {
            Ok(report_data) => {
                output::status(&report_data, json);
                0
            }
            Err(e) => report(e),
        },

        Commands::Dlq { command } => match command {
            DlqCommands::List { offset, limit } => match ctl.dlq_list(offset, limit).await {
                Ok(rows) => {
                    output::jobs(&rows, json);
                    0
                }
                Err(e) => report(e),
            },
            DlqCommands::Retry { job_id } => match ctl.dlq_retry(&job_id).await {
                Ok(job) => {
                    output::job_id(&job);
                    0
                }
                Err(e) => report(e),
            },
        },

        Commands::Config { command } => match command {
            ConfigCommands::Get => match ctl.config_get().await {
                Ok(map) => {
                    output::config(&map, json);
                    0
                }
                Err(e) => report(e),
            },
            ConfigCommands::Set { key, value } => match ctl.config_set(&key, &value).await {
                Ok(()) => 0,
                Err(e) => report(e),
            },
        },

        Commands::Worker { command } => match command {
            WorkerCommands::Start { count } => {
                match process::worker_start(ctl.workers.as_ref(), db_path, count).await {
                    Ok(ids) => {
                        for id in ids {
                            println!("{id}");
                        }
                        0
                    }
                    Err(e) => {
                        eprintln!("error: {e:#}");
                        1
                    }
                }
            }
            WorkerCommands::Stop => match process::worker_stop(ctl.workers.as_ref()).await {
                Ok(()) => 0,
                Err(e) => {
                    eprintln!("error: {e:#}");
                    1
                }
            },
        },

        Commands::WorkerRun => unreachable!("handled before dispatch"),
    }
}

fn report(e: QueueCtlError) -> i32 {
    eprintln!("error: {e}");
    e.exit_code()
}

/// The body of the hidden `worker-run` subcommand: run one Worker Runtime
/// loop in the foreground until SIGINT/SIGTERM.
async fn run_worker_foreground<J, W, C>(jobs: Arc<J>, workers: Arc<W>, config: Arc<C>)
where
    J: queuectl_core::store::JobStore + 'static,
    W: queuectl_core::store::WorkerRegistry + 'static,
    C: queuectl_core::store::ConfigStore + 'static,
{
    let host = hostname();
    let runtime = WorkerRuntime::new(jobs, workers, config, host);
    let shutdown = tokio_util::sync::CancellationToken::new();

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_token.cancel();
    });

    if let Err(e) = runtime.run(shutdown).await {
        eprintln!("worker loop exited with error: {e:#}");
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(_) => {
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(windows)]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}
