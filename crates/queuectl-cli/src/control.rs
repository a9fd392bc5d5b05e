//! Control Operations: the stateless façade the CLI collaborator calls.
//! Each operation either delegates to one Repository/Registry method or
//! composes a couple of calls into one user-visible action, playing the
//! same role as a `Dispatcher` sitting in front of a job queue.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use queuectl_core::config::{self, ConfigValue};
use queuectl_core::error::{QueueCtlError, Result};
use queuectl_core::job::{Job, JobSpec, StateCounts};
use queuectl_core::store::{ConfigStore, JobStore, WorkerRegistry};
use queuectl_core::worker::WorkerRow;

/// JSON wire shape accepted by `enqueue`. A thin, typed stand-in for
/// "dynamic JSON field access" — unknown fields are ignored by `serde`'s
/// default behavior on `JobSpec`.
#[derive(Debug, serde::Deserialize)]
struct EnqueueRequest {
    id: Option<String>,
    command: String,
    priority: Option<i64>,
    max_retries: Option<i64>,
    run_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub counts: StateCounts,
    pub workers: Vec<WorkerRow>,
}

pub struct QueueCtl<J, W, C> {
    pub jobs: Arc<J>,
    pub workers: Arc<W>,
    pub config: Arc<C>,
}

impl<J, W, C> Clone for QueueCtl<J, W, C> {
    fn clone(&self) -> Self {
        Self {
            jobs: self.jobs.clone(),
            workers: self.workers.clone(),
            config: self.config.clone(),
        }
    }
}

impl<J, W, C> QueueCtl<J, W, C>
where
    J: JobStore,
    W: WorkerRegistry,
    C: ConfigStore,
{
    pub fn new(jobs: Arc<J>, workers: Arc<W>, config: Arc<C>) -> Self {
        Self {
            jobs,
            workers,
            config,
        }
    }

    pub async fn enqueue(&self, raw_json: &str) -> Result<Job> {
        let req: EnqueueRequest = serde_json::from_str(raw_json)
            .map_err(|e| QueueCtlError::Validation(format!("invalid job JSON: {e}")))?;

        if req.command.trim().is_empty() {
            return Err(QueueCtlError::Validation("command must not be empty".into()));
        }

        self.jobs
            .insert(JobSpec {
                id: req.id,
                command: req.command,
                priority: req.priority,
                max_retries: req.max_retries,
                run_at: req.run_at,
            })
            .await
    }

    pub async fn list(
        &self,
        state_filter: Option<&str>,
        offset: u64,
        limit: Option<u64>,
    ) -> Result<Vec<Job>> {
        let all = self.jobs.list(state_filter).await?;
        Ok(paginate(all, offset, limit))
    }

    pub async fn get(&self, job_id: &str) -> Result<Job> {
        self.jobs.get(job_id).await
    }

    pub async fn status(&self) -> Result<StatusReport> {
        let counts = self.jobs.count_by_state().await?;
        let workers = self.workers.list().await?;
        Ok(StatusReport { counts, workers })
    }

    pub async fn dlq_list(&self, offset: u64, limit: Option<u64>) -> Result<Vec<Job>> {
        self.list(Some("dead"), offset, limit).await
    }

    pub async fn dlq_retry(&self, job_id: &str) -> Result<Job> {
        self.jobs.requeue_from_dlq(job_id).await
    }

    pub async fn config_get(&self) -> Result<BTreeMap<String, ConfigValue>> {
        self.config.get_all().await
    }

    pub async fn config_set(&self, key: &str, raw_value: &str) -> Result<()> {
        let value = config::validate(key, raw_value)?;
        self.config.set(key, value).await
    }
}

fn paginate<T>(items: Vec<T>, offset: u64, limit: Option<u64>) -> Vec<T> {
    let skipped = items.into_iter().skip(offset as usize);
    match limit {
        Some(n) => skipped.take(n as usize).collect(),
        None => skipped.collect(),
    }
}
