//! Integration tests for the Control Operations façade against a temp-file
//! SQLite store — the same harness shape as `queuectl-store`'s own tests,
//! one layer up.

use std::sync::Arc;

use queuectl_cli::control::QueueCtl;
use queuectl_core::error::QueueCtlError;
use queuectl_store::{connect, SqliteConfigStore, SqliteJobStore, SqliteWorkerRegistry};

type Ctl = QueueCtl<SqliteJobStore, SqliteWorkerRegistry, SqliteConfigStore>;

async fn harness() -> (tempfile::TempDir, Ctl) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.db");
    let pool = connect(path.to_str().unwrap()).await.unwrap();
    let ctl = QueueCtl::new(
        Arc::new(SqliteJobStore::new(pool.clone())),
        Arc::new(SqliteWorkerRegistry::new(pool.clone())),
        Arc::new(SqliteConfigStore::new(pool)),
    );
    (dir, ctl)
}

/// P5: every field accepted by `enqueue` is recoverable via `list`/`get`.
#[tokio::test]
async fn enqueue_round_trips_every_field() {
    let (_dir, ctl) = harness().await;

    let job = ctl
        .enqueue(r#"{"id":"r1","command":"echo hi","priority":7,"max_retries":5}"#)
        .await
        .unwrap();

    assert_eq!(job.id, "r1");
    assert_eq!(job.command, "echo hi");
    assert_eq!(job.priority, 7);
    assert_eq!(job.max_retries, 5);

    let fetched = ctl.get("r1").await.unwrap();
    assert_eq!(fetched.command, "echo hi");
    assert_eq!(fetched.priority, 7);
    assert_eq!(fetched.max_retries, 5);

    let listed = ctl.list(None, 0, None).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, "r1");
}

#[tokio::test]
async fn enqueue_rejects_malformed_json() {
    let (_dir, ctl) = harness().await;
    let err = ctl.enqueue("not json").await.unwrap_err();
    assert!(matches!(err, QueueCtlError::Validation(_)));
}

#[tokio::test]
async fn enqueue_rejects_missing_command_field() {
    let (_dir, ctl) = harness().await;
    let err = ctl.enqueue(r#"{"id":"x1"}"#).await.unwrap_err();
    assert!(matches!(err, QueueCtlError::Validation(_)));
}

#[tokio::test]
async fn duplicate_enqueue_is_rejected() {
    let (_dir, ctl) = harness().await;
    ctl.enqueue(r#"{"id":"dup","command":"true"}"#).await.unwrap();
    let err = ctl
        .enqueue(r#"{"id":"dup","command":"true"}"#)
        .await
        .unwrap_err();
    assert!(matches!(err, QueueCtlError::DuplicateId(_)));
}

#[tokio::test]
async fn list_pagination_applies_offset_and_limit() {
    let (_dir, ctl) = harness().await;
    for i in 0..5 {
        ctl.enqueue(&format!(r#"{{"id":"p{i}","command":"true"}}"#))
            .await
            .unwrap();
    }

    let page = ctl.list(None, 2, Some(2)).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, "p2");
    assert_eq!(page[1].id, "p3");
}

#[tokio::test]
async fn dlq_retry_on_non_dead_job_is_not_found() {
    let (_dir, ctl) = harness().await;
    ctl.enqueue(r#"{"id":"pending1","command":"true"}"#)
        .await
        .unwrap();
    let err = ctl.dlq_retry("pending1").await.unwrap_err();
    assert!(matches!(err, QueueCtlError::NotFound(_)));
}

#[tokio::test]
async fn dlq_retry_on_unknown_job_is_not_found() {
    let (_dir, ctl) = harness().await;
    let err = ctl.dlq_retry("does-not-exist").await.unwrap_err();
    assert!(matches!(err, QueueCtlError::NotFound(_)));
}

/// Config round-trips through `config_get`/`config_set`, and rejects
/// invalid types/negative values.
#[tokio::test]
async fn config_set_validates_and_round_trips() {
    let (_dir, ctl) = harness().await;

    ctl.config_set("max_retries", "9").await.unwrap();
    let map = ctl.config_get().await.unwrap();
    assert_eq!(map.get("max_retries").unwrap().as_int(), Some(9));

    let err = ctl.config_set("max_retries", "-1").await.unwrap_err();
    assert!(matches!(err, QueueCtlError::Config(_)));

    let err = ctl.config_set("poll_interval", "not-a-number").await.unwrap_err();
    assert!(matches!(err, QueueCtlError::Config(_)));
}

#[tokio::test]
async fn config_set_accepts_unknown_keys_as_opaque_strings() {
    let (_dir, ctl) = harness().await;
    ctl.config_set("custom_flag", "on").await.unwrap();
    let map = ctl.config_get().await.unwrap();
    assert_eq!(map.get("custom_flag").unwrap().render(), "on");
}

#[tokio::test]
async fn status_reports_counts_and_empty_worker_list() {
    let (_dir, ctl) = harness().await;
    ctl.enqueue(r#"{"id":"s1","command":"true"}"#).await.unwrap();
    ctl.enqueue(r#"{"id":"s2","command":"true"}"#).await.unwrap();

    let report = ctl.status().await.unwrap();
    assert_eq!(report.counts.pending, 2);
    assert!(report.workers.is_empty());
}
