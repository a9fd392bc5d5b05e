//! SQLite-backed Job Repository, embedding the Scheduler, the atomic Claim
//! Protocol, and Stuck-Job Recovery.
//!
//! The claim itself follows the same shape as `PgJobStore::claim_ready`
//! (select the ranked candidate, then a conditional `UPDATE ... WHERE` that
//! only succeeds if the row hasn't moved out from under us), adapted from
//! Postgres's `FOR UPDATE SKIP LOCKED` to a ranked-candidate retry loop,
//! since SQLite has no row-level locking primitive to skip past.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use queuectl_core::config;
use queuectl_core::error::{QueueCtlError, Result};
use queuectl_core::job::{AttemptOutcome, Job, JobSpec, JobState, StateCounts};
use queuectl_core::retry::{RetryDecision, RetryOutcome};
use queuectl_core::store::JobStore;

/// Bounded number of ranked candidates a single `claim_next` call will try
/// against the next candidate before giving up for this poll cycle.
const MAX_CLAIM_ATTEMPTS: usize = 5;

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_job(row: &sqlx::sqlite::SqliteRow) -> Result<Job> {
        let state_str: String = row.try_get("state").map_err(anyhow::Error::from)?;
        let state = JobState::parse(&state_str)
            .ok_or_else(|| QueueCtlError::Store(anyhow::anyhow!("bad state: {state_str}")))?;

        Ok(Job {
            id: row.try_get("id").map_err(anyhow::Error::from)?,
            command: row.try_get("command").map_err(anyhow::Error::from)?,
            state,
            priority: row.try_get("priority").map_err(anyhow::Error::from)?,
            attempts: row.try_get("attempts").map_err(anyhow::Error::from)?,
            max_retries: row.try_get("max_retries").map_err(anyhow::Error::from)?,
            run_at: row.try_get("run_at").map_err(anyhow::Error::from)?,
            enqueued_at: row.try_get("enqueued_at").map_err(anyhow::Error::from)?,
            started_at: row.try_get("started_at").map_err(anyhow::Error::from)?,
            finished_at: row.try_get("finished_at").map_err(anyhow::Error::from)?,
            picked_by: row.try_get("picked_by").map_err(anyhow::Error::from)?,
            last_error: row.try_get("last_error").map_err(anyhow::Error::from)?,
            stdout: row.try_get("stdout").map_err(anyhow::Error::from)?,
            stderr: row.try_get("stderr").map_err(anyhow::Error::from)?,
            exit_code: row.try_get("exit_code").map_err(anyhow::Error::from)?,
        })
    }

    /// Returns the staleness threshold for Stuck-Job Recovery, reading the
    /// live `poll_interval` from the config table fresh on every call.
    async fn stale_heartbeat_before(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let row = sqlx::query("SELECT value FROM config WHERE key = ?")
            .bind(config::KEY_POLL_INTERVAL)
            .fetch_optional(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        let poll_interval: f64 = match row {
            Some(r) => {
                let raw: String = r.try_get("value").map_err(anyhow::Error::from)?;
                raw.parse().unwrap_or(0.5)
            }
            None => 0.5,
        };

        let stale_secs = (3.0 * poll_interval).max(30.0);
        Ok(now - chrono::Duration::milliseconds((stale_secs * 1000.0) as i64))
    }

    /// Stuck-Job Recovery: returns orphaned `processing` jobs to `pending`
    /// when their owning worker's heartbeat is stale and the worker has not
    /// already released its claim by reaching `stopped`.
    async fn recover_stuck_jobs(&self, now: DateTime<Utc>) -> Result<()> {
        let threshold = self.stale_heartbeat_before(now).await?;

        sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending', picked_by = NULL, last_error = 'worker lost'
            WHERE state = 'processing'
              AND picked_by IN (
                  SELECT id FROM workers
                  WHERE status IN ('running', 'stopping') AND heartbeat_at < ?
              )
            "#,
        )
        .bind(threshold)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        Ok(())
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, spec: JobSpec) -> Result<Job> {
        if spec.command.trim().is_empty() {
            return Err(QueueCtlError::Validation("command must not be empty".into()));
        }

        let id = spec
            .id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let max_retries = match spec.max_retries {
            Some(v) => v,
            None => {
                let row = sqlx::query("SELECT value FROM config WHERE key = ?")
                    .bind(config::KEY_MAX_RETRIES)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(anyhow::Error::from)?;
                match row {
                    Some(r) => {
                        let raw: String = r.try_get("value").map_err(anyhow::Error::from)?;
                        raw.parse().unwrap_or(3)
                    }
                    None => 3,
                }
            }
        };

        let now = Utc::now();
        let priority = spec.priority.unwrap_or(0);
        let run_at = spec.run_at.unwrap_or(now);

        sqlx::query(
            r#"
            INSERT INTO jobs
                (id, command, state, priority, attempts, max_retries, run_at, enqueued_at)
            VALUES
                (?, ?, 'pending', ?, 0, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&spec.command)
        .bind(priority)
        .bind(max_retries)
        .bind(run_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => QueueCtlError::DuplicateId(id.clone()),
            _ => QueueCtlError::Store(e.into()),
        })?;

        self.get(&id).await
    }

    async fn claim_next(&self, worker_id: &str, now: DateTime<Utc>) -> Result<Option<Job>> {
        self.recover_stuck_jobs(now).await?;

        let mut excluded: Vec<String> = Vec::new();

        for _ in 0..MAX_CLAIM_ATTEMPTS {
            let placeholders = excluded
                .iter()
                .map(|_| "?")
                .collect::<Vec<_>>()
                .join(", ");
            let query = format!(
                r#"
                SELECT id FROM jobs
                WHERE state = 'pending' AND run_at <= ? AND picked_by IS NULL
                  {exclude_clause}
                ORDER BY priority DESC, run_at ASC, enqueued_at ASC, id ASC
                LIMIT 1
                "#,
                exclude_clause = if excluded.is_empty() {
                    String::new()
                } else {
                    format!("AND id NOT IN ({placeholders})")
                }
            );

            let mut q = sqlx::query(&query).bind(now);
            for id in &excluded {
                q = q.bind(id);
            }
            let candidate = q
                .fetch_optional(&self.pool)
                .await
                .map_err(anyhow::Error::from)?;

            let Some(candidate_row) = candidate else {
                return Ok(None);
            };
            let candidate_id: String = candidate_row.try_get("id").map_err(anyhow::Error::from)?;

            let result = sqlx::query(
                r#"
                UPDATE jobs
                SET state = 'processing', picked_by = ?, started_at = ?
                WHERE id = ? AND state = 'pending' AND picked_by IS NULL
                "#,
            )
            .bind(worker_id)
            .bind(now)
            .bind(&candidate_id)
            .execute(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

            if result.rows_affected() == 1 {
                return Ok(Some(self.get(&candidate_id).await?));
            }

            // Lost the race for this candidate; try the next-ranked one.
            excluded.push(candidate_id);
        }

        Ok(None)
    }

    async fn mark_completed(
        &self,
        job_id: &str,
        worker_id: &str,
        outcome: AttemptOutcome,
        finished_at: DateTime<Utc>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'completed',
                attempts = attempts + 1,
                finished_at = ?,
                picked_by = NULL,
                stdout = ?,
                stderr = ?,
                exit_code = ?,
                last_error = NULL
            WHERE id = ? AND state = 'processing' AND picked_by = ?
            "#,
        )
        .bind(finished_at)
        .bind(&outcome.stdout)
        .bind(&outcome.stderr)
        .bind(outcome.exit_code.map(i64::from))
        .bind(job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        if result.rows_affected() == 0 {
            return Err(QueueCtlError::Validation(format!(
                "{worker_id} does not own job {job_id}"
            )));
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        job_id: &str,
        worker_id: &str,
        err: &str,
        outcome: AttemptOutcome,
        now: DateTime<Utc>,
        retry: RetryOutcome,
    ) -> Result<()> {
        let result = match retry.decision {
            RetryDecision::Retry => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = 'pending',
                        attempts = attempts + 1,
                        run_at = ?,
                        picked_by = NULL,
                        last_error = ?,
                        stdout = ?,
                        stderr = ?,
                        exit_code = ?
                    WHERE id = ? AND state = 'processing' AND picked_by = ?
                    "#,
                )
                .bind(retry.new_run_at)
                .bind(err)
                .bind(&outcome.stdout)
                .bind(&outcome.stderr)
                .bind(outcome.exit_code.map(i64::from))
                .bind(job_id)
                .bind(worker_id)
                .execute(&self.pool)
                .await
                .map_err(anyhow::Error::from)?
            }
            RetryDecision::Dead => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = 'dead',
                        attempts = attempts + 1,
                        finished_at = ?,
                        picked_by = NULL,
                        last_error = ?,
                        stdout = ?,
                        stderr = ?,
                        exit_code = ?
                    WHERE id = ? AND state = 'processing' AND picked_by = ?
                    "#,
                )
                .bind(now)
                .bind(err)
                .bind(&outcome.stdout)
                .bind(&outcome.stderr)
                .bind(outcome.exit_code.map(i64::from))
                .bind(job_id)
                .bind(worker_id)
                .execute(&self.pool)
                .await
                .map_err(anyhow::Error::from)?
            }
        };

        if result.rows_affected() == 0 {
            return Err(QueueCtlError::Validation(format!(
                "{worker_id} does not own job {job_id}"
            )));
        }
        Ok(())
    }

    async fn requeue_from_dlq(&self, job_id: &str) -> Result<Job> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'pending',
                attempts = 0,
                picked_by = NULL,
                last_error = NULL,
                run_at = ?
            WHERE id = ? AND state = 'dead'
            "#,
        )
        .bind(now)
        .bind(job_id)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        if result.rows_affected() == 0 {
            return Err(QueueCtlError::NotFound(format!(
                "job {job_id} is not in the dead letter queue"
            )));
        }

        self.get(job_id).await
    }

    async fn list(&self, state_filter: Option<&str>) -> Result<Vec<Job>> {
        let rows = match state_filter {
            Some(state) => {
                if JobState::parse(state).is_none() {
                    return Err(QueueCtlError::Validation(format!("unknown state: {state}")));
                }
                sqlx::query("SELECT * FROM jobs WHERE state = ? ORDER BY enqueued_at ASC")
                    .bind(state)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(anyhow::Error::from)?
            }
            None => sqlx::query("SELECT * FROM jobs ORDER BY enqueued_at ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(anyhow::Error::from)?,
        };

        rows.iter().map(Self::row_to_job).collect()
    }

    async fn get(&self, job_id: &str) -> Result<Job> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(anyhow::Error::from)?
            .ok_or_else(|| QueueCtlError::NotFound(format!("job {job_id}")))?;

        Self::row_to_job(&row)
    }

    async fn count_by_state(&self) -> Result<StateCounts> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE state = 'pending') AS pending,
                COUNT(*) FILTER (WHERE state = 'processing') AS processing,
                COUNT(*) FILTER (WHERE state = 'completed') AS completed,
                COUNT(*) FILTER (WHERE state = 'failed') AS failed,
                COUNT(*) FILTER (WHERE state = 'dead') AS dead
            FROM jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        Ok(StateCounts {
            pending: row.try_get("pending").map_err(anyhow::Error::from)?,
            processing: row.try_get("processing").map_err(anyhow::Error::from)?,
            completed: row.try_get("completed").map_err(anyhow::Error::from)?,
            failed: row.try_get("failed").map_err(anyhow::Error::from)?,
            dead: row.try_get("dead").map_err(anyhow::Error::from)?,
        })
    }
}
