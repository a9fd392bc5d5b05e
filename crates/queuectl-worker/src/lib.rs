//! # queuectl-worker
//!
//! The Worker Runtime: the process-local loop that registers in the Worker
//! Registry, then repeatedly heartbeats, claims a job via the Job
//! Repository's embedded Scheduler, executes it as a shell-command child
//! process, and finalizes the outcome.
//!
//! `executor` is the IO half (spawn, capture, timeout/kill); `runtime` is
//! the policy half (loop structure, Retry Policy wiring, shutdown
//! draining), kept separate the way transport IO is kept separate from
//! dispatch logic elsewhere in this workspace.

pub mod executor;
pub mod runtime;

pub use executor::{ExecResult, CAPTURE_CAP_BYTES, TIMEOUT_EXIT_CODE};
pub use runtime::WorkerRuntime;
