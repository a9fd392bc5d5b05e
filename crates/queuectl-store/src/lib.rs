//! # queuectl-store
//!
//! SQLite implementation of the `queuectl-core` Store traits: the Job
//! Repository (with the embedded Scheduler, Claim Protocol, and Stuck-Job
//! Recovery), the Worker Registry, and the Config Service.
//!
//! Plays the same role relative to `queuectl-core` that `seesaw-job-postgres`
//! plays relative to `seesaw-core`, adapted from a PostgreSQL pool to a
//! single-file embedded engine.

mod config_store;
mod job_store;
mod pool;
mod schema;
mod worker_registry;

pub use config_store::SqliteConfigStore;
pub use job_store::SqliteJobStore;
pub use pool::connect;
pub use worker_registry::SqliteWorkerRegistry;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use queuectl_core::job::JobSpec;
    use queuectl_core::store::JobStore;

    async fn temp_store() -> (tempfile::TempDir, SqliteJobStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = connect(path.to_str().unwrap()).await.unwrap();
        (dir, SqliteJobStore::new(pool))
    }

    #[tokio::test]
    async fn insert_defaults_and_round_trips() {
        let (_dir, store) = temp_store().await;

        let job = store
            .insert(JobSpec {
                id: Some("j1".into()),
                command: "echo hi".into(),
                priority: None,
                max_retries: None,
                run_at: None,
            })
            .await
            .unwrap();

        assert_eq!(job.id, "j1");
        assert_eq!(job.priority, 0);
        assert_eq!(job.max_retries, 3);
        assert_eq!(job.attempts, 0);
    }

    #[tokio::test]
    async fn duplicate_id_rejected() {
        let (_dir, store) = temp_store().await;
        let spec = || JobSpec {
            id: Some("dup".into()),
            command: "true".into(),
            priority: None,
            max_retries: None,
            run_at: None,
        };
        store.insert(spec()).await.unwrap();
        let err = store.insert(spec()).await.unwrap_err();
        assert!(matches!(err, queuectl_core::error::QueueCtlError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn priority_ordering_beats_fifo() {
        let (_dir, store) = temp_store().await;
        store
            .insert(JobSpec {
                id: Some("lo".into()),
                command: "echo lo".into(),
                priority: Some(1),
                max_retries: None,
                run_at: None,
            })
            .await
            .unwrap();
        store
            .insert(JobSpec {
                id: Some("hi".into()),
                command: "echo hi".into(),
                priority: Some(10),
                max_retries: None,
                run_at: None,
            })
            .await
            .unwrap();

        let claimed = store.claim_next("w1", Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.id, "hi");
    }

    #[tokio::test]
    async fn future_run_at_not_claimed_early() {
        let (_dir, store) = temp_store().await;
        store
            .insert(JobSpec {
                id: Some("future".into()),
                command: "echo later".into(),
                priority: None,
                max_retries: None,
                run_at: Some(Utc::now() + chrono::Duration::hours(1)),
            })
            .await
            .unwrap();

        let claimed = store.claim_next("w1", Utc::now()).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn claim_is_exclusive_and_sets_invariants() {
        let (_dir, store) = temp_store().await;
        store
            .insert(JobSpec {
                id: Some("j1".into()),
                command: "true".into(),
                priority: None,
                max_retries: None,
                run_at: None,
            })
            .await
            .unwrap();

        let claimed = store.claim_next("w1", Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.picked_by.as_deref(), Some("w1"));
        assert!(claimed.started_at.is_some());

        // Already claimed; a second worker gets nothing.
        let second = store.claim_next("w2", Utc::now()).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn dlq_retry_resets_attempts() {
        let (_dir, store) = temp_store().await;
        store
            .insert(JobSpec {
                id: Some("j1".into()),
                command: "false".into(),
                priority: None,
                max_retries: Some(0),
                run_at: None,
            })
            .await
            .unwrap();

        let claimed = store.claim_next("w1", Utc::now()).await.unwrap().unwrap();
        let retry = queuectl_core::retry::decide(1, 0, 2, Utc::now());
        store
            .mark_failed(
                &claimed.id,
                "w1",
                "boom",
                queuectl_core::job::AttemptOutcome {
                    stdout: String::new(),
                    stderr: "boom".into(),
                    exit_code: Some(1),
                },
                Utc::now(),
                retry,
            )
            .await
            .unwrap();

        let dead = store.get("j1").await.unwrap();
        assert_eq!(dead.state, queuectl_core::job::JobState::Dead);

        let retried = store.requeue_from_dlq("j1").await.unwrap();
        assert_eq!(retried.state, queuectl_core::job::JobState::Pending);
        assert_eq!(retried.attempts, 0);
        assert!(retried.picked_by.is_none());
        assert!(retried.last_error.is_none());
    }

    /// P6 (store-level slice): a job claimed by a worker whose heartbeat has
    /// gone stale is returned to `pending` by Stuck-Job Recovery on the
    /// next `claim_next` call, without its `attempts` counter moving.
    #[tokio::test]
    async fn stuck_job_recovery_frees_orphaned_claim() {
        use queuectl_core::store::WorkerRegistry;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = connect(path.to_str().unwrap()).await.unwrap();
        let jobs = SqliteJobStore::new(pool.clone());
        let reg = SqliteWorkerRegistry::new(pool);

        reg.register("dead-worker", 4242, "test-host").await.unwrap();
        reg.mark_running("dead-worker").await.unwrap();

        jobs.insert(JobSpec {
            id: Some("c1".into()),
            command: "sleep 60".into(),
            priority: None,
            max_retries: None,
            run_at: None,
        })
        .await
        .unwrap();

        let claimed = jobs.claim_next("dead-worker", Utc::now()).await.unwrap().unwrap();
        assert_eq!(claimed.id, "c1");

        // Simulate a crash: the worker's heartbeat goes stale, well past
        // `max(3*poll_interval, 30s)` with the default poll_interval.
        let stale = Utc::now() - chrono::Duration::seconds(40);
        reg.heartbeat("dead-worker", stale).await.unwrap();

        let recovered = jobs
            .claim_next("survivor-worker", Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recovered.id, "c1");
        assert_eq!(recovered.picked_by.as_deref(), Some("survivor-worker"));
        assert_eq!(recovered.attempts, 0);
    }
}
