//! The Job entity and the inputs/outputs of the Job Repository contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal and transient states a [`Job`] can occupy.
///
/// `Failed` is reserved for implementations that choose to materialize it as
/// a distinct row state; this implementation does not (see `DESIGN.md`) and
/// keeps retried jobs in `Pending` with an incremented `attempts` counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
    Dead,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobState::Pending),
            "processing" => Some(JobState::Processing),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "dead" => Some(JobState::Dead),
            _ => None,
        }
    }
}

/// A durable unit of work: a shell command plus scheduling and outcome
/// metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub command: String,
    pub state: JobState,
    pub priority: i64,
    pub attempts: i64,
    pub max_retries: i64,
    pub run_at: DateTime<Utc>,
    pub enqueued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub picked_by: Option<String>,
    pub last_error: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub exit_code: Option<i64>,
}

/// Input accepted by `JobRepository::insert`. Unset optional fields fall
/// back to Config defaults (priority 0, `max_retries` from Config, `run_at`
/// now).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobSpec {
    pub id: Option<String>,
    pub command: String,
    pub priority: Option<i64>,
    pub max_retries: Option<i64>,
    pub run_at: Option<DateTime<Utc>>,
}

/// Outcome of a finished attempt, captured by the Worker Runtime and fed to
/// `mark_completed`/`mark_failed`.
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
}

/// Aggregate counts used by `status`/`count_by_state`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateCounts {
    pub pending: i64,
    pub processing: i64,
    pub completed: i64,
    pub failed: i64,
    pub dead: i64,
}
