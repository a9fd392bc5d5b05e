//! Argv surface: the `queuectl` command table expressed as a `clap` derive
//! parser.
//! Mirrors the top-level `Cli { global flags, #[command(subcommand)] }`
//! shape used by `fraiseql-cli`'s `main.rs`, with nested subcommand enums
//! for `worker`, `dlq`, and `config`.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "queuectl", author, version, about = "Durable background job queue", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging (overridden by `RUST_LOG` if set).
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Render read commands as pretty JSON instead of a plain-text table.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Insert one job from a JSON submission and print its id.
    Enqueue {
        /// `{"command": "...", "id"?, "priority"?, "max_retries"?, "run_at"?}`
        json: String,
    },

    /// List jobs, optionally filtered by state.
    List {
        #[arg(long = "state", value_name = "STATE")]
        state: Option<String>,

        /// Skip this many rows (applied after ordering by `enqueued_at`).
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Return at most this many rows. Omit for no limit.
        #[arg(long)]
        limit: Option<u64>,
    },

    /// Print counts by state and the live worker list.
    Status,

    /// Worker lifecycle commands.
    Worker {
        #[command(subcommand)]
        command: WorkerCommands,
    },

    /// Dead Letter Queue inspection and replay.
    Dlq {
        #[command(subcommand)]
        command: DlqCommands,
    },

    /// Config Service get/set.
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Hidden entry point: run a single Worker Runtime loop in the
    /// foreground. `worker start` re-execs the current binary with this
    /// subcommand, detached, to get genuine OS-process crash independence.
    #[command(hide = true, name = "worker-run")]
    WorkerRun,
}

#[derive(Debug, Subcommand)]
pub enum WorkerCommands {
    /// Spawn `--count` worker processes and wait for them to register.
    Start {
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Gracefully stop every live worker.
    Stop,
}

#[derive(Debug, Subcommand)]
pub enum DlqCommands {
    /// List jobs in state `dead`.
    List {
        #[arg(long, default_value_t = 0)]
        offset: u64,
        #[arg(long)]
        limit: Option<u64>,
    },
    /// Requeue a dead job back to `pending`.
    Retry { job_id: String },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print all config key/value pairs (recognized keys merged with
    /// defaults, plus any unknown keys previously set).
    Get,
    /// Set one config value.
    Set { key: String, value: String },
}
