//! The Worker Runtime main loop: register, then repeatedly heartbeat / claim
//! / execute / finalize until a shutdown signal arrives, at which point the
//! current job (if any) is allowed to finish before the worker marks itself
//! `stopped`.
//!
//! Grounded on the claim/process/shutdown shape of `JobWorker::run` (poll,
//! process, drain on shutdown) collapsed to a single-job-at-a-time
//! contract, keeping IO (the executor) separate from policy (the Retry
//! Policy in `queuectl-core`).

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use queuectl_core::config::EngineConfig;
use queuectl_core::retry;
use queuectl_core::store::{ConfigStore, JobStore, WorkerRegistry};

use crate::executor;

pub struct WorkerRuntime<J, W, C> {
    pub worker_id: String,
    pub jobs: Arc<J>,
    pub workers: Arc<W>,
    pub config: Arc<C>,
    pub host: String,
}

impl<J, W, C> WorkerRuntime<J, W, C>
where
    J: JobStore + 'static,
    W: WorkerRegistry + 'static,
    C: ConfigStore + 'static,
{
    pub fn new(jobs: Arc<J>, workers: Arc<W>, config: Arc<C>, host: impl Into<String>) -> Self {
        Self {
            worker_id: format!("worker-{}", uuid::Uuid::new_v4()),
            jobs,
            workers,
            config,
            host: host.into(),
        }
    }

    async fn read_config(&self) -> EngineConfig {
        match self.config.get_all().await {
            Ok(map) => EngineConfig::from_map(&map),
            Err(e) => {
                warn!(error = %e, "failed to read config, using defaults");
                EngineConfig::from_map(&Default::default())
            }
        }
    }

    /// Run the loop until `shutdown` is cancelled: register, then loop
    /// heartbeat/claim/execute until asked to stop, then drain to
    /// `stopping`/`stopped`.
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let os_pid = std::process::id() as i64;
        self.workers
            .register(&self.worker_id, os_pid, &self.host)
            .await?;
        self.workers.mark_running(&self.worker_id).await?;
        info!(worker_id = %self.worker_id, os_pid, "worker registered");

        // Flip to `stopping` the instant the signal arrives, independent of
        // where the main loop happens to be (including mid-job-drain), so
        // `status` reflects the drain window immediately rather than only
        // once the loop next checks in.
        let stopping_watcher = {
            let workers = self.workers.clone();
            let worker_id = self.worker_id.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                shutdown.cancelled().await;
                if let Err(e) = workers.mark_stopping(&worker_id).await {
                    error!(worker_id = %worker_id, error = %e, "failed to mark worker stopping");
                }
            })
        };

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let now = Utc::now();
            self.workers.heartbeat(&self.worker_id, now).await?;

            let engine_config = self.read_config().await;

            match self.jobs.claim_next(&self.worker_id, now).await {
                Ok(Some(job)) => {
                    debug!(worker_id = %self.worker_id, job_id = %job.id, "claimed job");
                    self.execute_and_finalize(job, &engine_config).await;
                }
                Ok(None) => {
                    let sleep = Duration::from_secs_f64(engine_config.poll_interval_secs.max(0.0));
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(sleep) => {}
                    }
                }
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "claim_next failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        stopping_watcher.await.ok();
        self.workers.mark_stopped(&self.worker_id).await?;
        info!(worker_id = %self.worker_id, "worker stopped");
        Ok(())
    }

    async fn execute_and_finalize(&self, job: queuectl_core::job::Job, config: &EngineConfig) {
        let timeout = Duration::from_secs(config.job_timeout_secs.max(0) as u64);
        let result = executor::run(&job.command, timeout).await;
        let now = Utc::now();

        if result.is_success() {
            if let Err(e) = self
                .jobs
                .mark_completed(&job.id, &self.worker_id, result.outcome, now)
                .await
            {
                error!(job_id = %job.id, error = %e, "failed to mark job completed");
            }
            return;
        }

        let err_message = result.last_error.unwrap_or_else(|| "unknown failure".into());
        let attempts_after_failure = job.attempts + 1;
        let retry = retry::decide(
            attempts_after_failure,
            job.max_retries,
            config.backoff_base,
            now,
        );

        if let Err(e) = self
            .jobs
            .mark_failed(
                &job.id,
                &self.worker_id,
                &err_message,
                result.outcome,
                now,
                retry,
            )
            .await
        {
            error!(job_id = %job.id, error = %e, "failed to mark job failed");
        }
    }
}
