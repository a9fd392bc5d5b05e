//! The error taxonomy surfaced by the control-plane operations.

use thiserror::Error;

/// Errors the core engine can surface. A failed command execution and a
/// lost worker are intentionally not variants here: they are recorded on
/// the Job/Worker rows and fed to the Retry Policy, never propagated as
/// exceptions.
#[derive(Debug, Error)]
pub enum QueueCtlError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("job id already exists: {0}")]
    DuplicateId(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl QueueCtlError {
    /// The CLI exit code this error maps to.
    pub fn exit_code(&self) -> i32 {
        match self {
            QueueCtlError::Validation(_)
            | QueueCtlError::DuplicateId(_)
            | QueueCtlError::NotFound(_)
            | QueueCtlError::Config(_) => 2,
            QueueCtlError::Store(_) => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueCtlError>;
