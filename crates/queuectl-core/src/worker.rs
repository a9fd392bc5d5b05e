//! The Worker entity tracked by the Worker Registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Starting => "starting",
            WorkerStatus::Running => "running",
            WorkerStatus::Stopping => "stopping",
            WorkerStatus::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "starting" => Some(WorkerStatus::Starting),
            "running" => Some(WorkerStatus::Running),
            "stopping" => Some(WorkerStatus::Stopping),
            "stopped" => Some(WorkerStatus::Stopped),
            _ => None,
        }
    }

    /// Workers in these statuses are still considered "live" for the
    /// purposes of Stuck-Job Recovery.
    pub fn is_live(&self) -> bool {
        matches!(self, WorkerStatus::Starting | WorkerStatus::Running)
    }
}

/// A row in the Worker table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRow {
    pub id: String,
    pub os_pid: i64,
    pub status: WorkerStatus,
    pub started_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
    pub host: String,
}
