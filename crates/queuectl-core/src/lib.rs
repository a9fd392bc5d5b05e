//! # queuectl-core
//!
//! Domain types, storage-agnostic traits, and pure policy functions for the
//! QueueCTL job engine. Nothing in this crate performs IO: the Job/Worker/
//! Config entities are plain data, the `JobStore`/`WorkerRegistry`/
//! `ConfigStore` traits describe the contract a Store implementation must
//! satisfy, and the Retry Policy is a pure function of its inputs.
//!
//! `queuectl-store` provides the concrete SQLite-backed implementation;
//! `queuectl-worker` drives the claim/execute/finalize loop against these
//! traits; `queuectl-cli` exposes Control Operations over the same traits to
//! the command line.

pub mod config;
pub mod error;
pub mod job;
pub mod retry;
pub mod store;
pub mod worker;

pub use config::{ConfigValue, EngineConfig};
pub use error::{QueueCtlError, Result};
pub use job::{AttemptOutcome, Job, JobSpec, JobState, StateCounts};
pub use retry::{decide as retry_decide, RetryDecision, RetryOutcome};
pub use store::{ConfigStore, JobStore, WorkerRegistry};
pub use worker::{WorkerRow, WorkerStatus};
