//! End-to-end worker loop tests against a temp-file SQLite store. Most
//! scenarios run the loop as in-process tokio tasks standing in for
//! separate OS processes; real process isolation (spawn + SIGKILL) is
//! exercised separately in `queuectl-cli`'s integration tests, where the
//! `queuectl` binary actually exists to spawn.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use queuectl_core::config::ConfigValue;
use queuectl_core::job::{Job, JobSpec, JobState};
use queuectl_core::store::{ConfigStore, JobStore};
use queuectl_store::{connect, SqliteConfigStore, SqliteJobStore, SqliteWorkerRegistry};
use queuectl_worker::WorkerRuntime;

async fn harness() -> (
    tempfile::TempDir,
    Arc<SqliteJobStore>,
    Arc<SqliteWorkerRegistry>,
    Arc<SqliteConfigStore>,
) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let pool = connect(path.to_str().unwrap()).await.unwrap();
    (
        dir,
        Arc::new(SqliteJobStore::new(pool.clone())),
        Arc::new(SqliteWorkerRegistry::new(pool.clone())),
        Arc::new(SqliteConfigStore::new(pool)),
    )
}

/// Poll `job_id` until it reaches `target`, then cancel `shutdown`. Bounds
/// the worker loop's lifetime to "until the expected outcome is observed,
/// or the test's own timeout fires" rather than a fixed sleep.
async fn stop_once_reached(
    jobs: Arc<SqliteJobStore>,
    shutdown: CancellationToken,
    job_id: &'static str,
    target: JobState,
    timeout: Duration,
) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(job) = jobs.get(job_id).await {
            if job.state == target {
                shutdown.cancel();
                return;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            shutdown.cancel();
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// S1: a job whose command always succeeds completes after exactly one
/// attempt.
#[tokio::test]
async fn happy_path_completes() {
    let (_dir, jobs, workers, config) = harness().await;

    jobs.insert(JobSpec {
        id: Some("h1".into()),
        command: "true".into(),
        priority: None,
        max_retries: None,
        run_at: None,
    })
    .await
    .unwrap();

    let runtime = WorkerRuntime::new(jobs.clone(), workers, config, "test-host");
    let shutdown = CancellationToken::new();
    tokio::spawn(stop_once_reached(
        jobs.clone(),
        shutdown.clone(),
        "h1",
        JobState::Completed,
        Duration::from_secs(5),
    ));

    runtime.run(shutdown).await.unwrap();

    let job: Job = jobs.get("h1").await.unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.exit_code, Some(0));
}

/// S2: a job whose command always fails, with `max_retries=2`, goes
/// pending -> pending -> pending -> dead after exactly 3 attempts.
#[tokio::test]
async fn retry_then_dead() {
    let (_dir, jobs, workers, config) = harness().await;

    config.set("max_retries", ConfigValue::Int(2)).await.unwrap();
    config.set("backoff_base", ConfigValue::Int(2)).await.unwrap();

    jobs.insert(JobSpec {
        id: Some("f1".into()),
        command: "false".into(),
        priority: None,
        max_retries: None,
        run_at: None,
    })
    .await
    .unwrap();

    let runtime = WorkerRuntime::new(jobs.clone(), workers, config, "test-host");
    let shutdown = CancellationToken::new();
    tokio::spawn(stop_once_reached(
        jobs.clone(),
        shutdown.clone(),
        "f1",
        JobState::Dead,
        Duration::from_secs(15),
    ));

    runtime.run(shutdown).await.unwrap();

    let job = jobs.get("f1").await.unwrap();
    assert_eq!(job.state, JobState::Dead);
    assert_eq!(job.attempts, 3);
    assert!(job.finished_at.is_some());

    let retried = jobs.requeue_from_dlq("f1").await.unwrap();
    assert_eq!(retried.state, JobState::Pending);
    assert_eq!(retried.attempts, 0);
    assert!(retried.last_error.is_none());
}

/// S3: 3 concurrent workers draining 10 jobs against the same store each
/// complete exactly once — no job is claimed by two workers at once and no
/// job is double-finalized.
#[tokio::test]
async fn concurrent_workers_no_duplicate_completion() {
    let (_dir, jobs, workers, config) = harness().await;

    let ids: Vec<String> = (0..10).map(|i| format!("c{i}")).collect();
    for id in &ids {
        jobs.insert(JobSpec {
            id: Some(id.clone()),
            command: "true".into(),
            priority: None,
            max_retries: None,
            run_at: None,
        })
        .await
        .unwrap();
    }

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();
    for _ in 0..3 {
        let runtime = WorkerRuntime::new(jobs.clone(), workers.clone(), config.clone(), "test-host");
        let token = shutdown.clone();
        handles.push(tokio::spawn(runtime.run(token)));
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let mut all_done = true;
        for id in &ids {
            let job = jobs.get(id).await.unwrap();
            if job.state != JobState::Completed {
                all_done = false;
                break;
            }
        }
        if all_done || tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    shutdown.cancel();
    for h in handles {
        h.await.unwrap().unwrap();
    }

    for id in &ids {
        let job = jobs.get(id).await.unwrap();
        assert_eq!(job.state, JobState::Completed, "job {id} did not complete");
        assert_eq!(job.attempts, 1, "job {id} ran more than once");
    }
}

/// S6: given two eligible jobs with priorities 10 and 1 and identical
/// `run_at`, the worker claims and starts the higher-priority job first.
#[tokio::test]
async fn priority_ordering_wins() {
    let (_dir, jobs, workers, config) = harness().await;

    let now = Utc::now();
    jobs.insert(JobSpec {
        id: Some("lo".into()),
        command: "echo lo".into(),
        priority: Some(1),
        max_retries: None,
        run_at: Some(now),
    })
    .await
    .unwrap();
    jobs.insert(JobSpec {
        id: Some("hi".into()),
        command: "echo hi".into(),
        priority: Some(10),
        max_retries: None,
        run_at: Some(now),
    })
    .await
    .unwrap();

    let runtime = WorkerRuntime::new(jobs.clone(), workers, config, "test-host");
    let shutdown = CancellationToken::new();
    tokio::spawn(stop_once_reached(
        jobs.clone(),
        shutdown.clone(),
        "lo",
        JobState::Completed,
        Duration::from_secs(5),
    ));

    runtime.run(shutdown).await.unwrap();

    let hi = jobs.get("hi").await.unwrap();
    let lo = jobs.get("lo").await.unwrap();
    assert!(hi.started_at.unwrap() <= lo.started_at.unwrap());
    assert_eq!(hi.state, JobState::Completed);
    assert_eq!(lo.state, JobState::Completed);
}
