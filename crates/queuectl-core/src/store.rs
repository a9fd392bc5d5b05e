//! Storage-backend-agnostic traits implemented by `queuectl-store`.
//!
//! Mirrors the split between `seesaw-core`'s `JobStore` trait and
//! `seesaw-job-postgres`'s concrete implementation: this crate defines the
//! contract, `queuectl-store` provides the SQLite-backed body.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::config::ConfigValue;
use crate::error::Result;
use crate::job::{AttemptOutcome, Job, JobSpec, StateCounts};
use crate::retry::RetryOutcome;
use crate::worker::WorkerRow;

/// Job Repository operations.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, spec: JobSpec) -> Result<Job>;

    /// Runs Stuck-Job Recovery, then attempts the atomic claim against the
    /// next eligible candidate. Returns `None` if no eligible job exists.
    async fn claim_next(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>>;

    async fn mark_completed(
        &self,
        job_id: &str,
        worker_id: &str,
        outcome: AttemptOutcome,
        finished_at: DateTime<Utc>,
    ) -> Result<()>;

    /// `outcome` captures the failed attempt's captured IO; `retry` is the
    /// already-computed Retry Policy decision to apply.
    async fn mark_failed(
        &self,
        job_id: &str,
        worker_id: &str,
        err: &str,
        outcome: AttemptOutcome,
        now: DateTime<Utc>,
        retry: RetryOutcome,
    ) -> Result<()>;

    async fn requeue_from_dlq(&self, job_id: &str) -> Result<Job>;

    async fn list(&self, state_filter: Option<&str>) -> Result<Vec<Job>>;

    async fn get(&self, job_id: &str) -> Result<Job>;

    async fn count_by_state(&self) -> Result<StateCounts>;
}

/// Worker Registry operations.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    async fn register(&self, worker_id: &str, os_pid: i64, host: &str) -> Result<()>;
    async fn mark_running(&self, worker_id: &str) -> Result<()>;
    async fn heartbeat(&self, worker_id: &str, now: DateTime<Utc>) -> Result<()>;
    async fn mark_stopping(&self, worker_id: &str) -> Result<()>;
    async fn mark_stopped(&self, worker_id: &str) -> Result<()>;
    async fn get(&self, worker_id: &str) -> Result<WorkerRow>;
    async fn list(&self) -> Result<Vec<WorkerRow>>;
}

/// Config Service operations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn get_all(&self) -> Result<BTreeMap<String, ConfigValue>>;
    async fn set(&self, key: &str, value: ConfigValue) -> Result<()>;
}
