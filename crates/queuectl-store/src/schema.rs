//! The three logical relations (Jobs, Workers, Config), expressed as SQLite
//! DDL. `state`/`status` persist as TEXT with a CHECK constraint standing in
//! for the native enum type a Postgres schema would use, since SQLite has
//! none.

pub const CREATE_JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id TEXT PRIMARY KEY,
    command TEXT NOT NULL,
    state TEXT NOT NULL CHECK (state IN ('pending', 'processing', 'completed', 'failed', 'dead')),
    priority INTEGER NOT NULL DEFAULT 0,
    attempts INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 3,
    run_at TEXT NOT NULL,
    enqueued_at TEXT NOT NULL,
    started_at TEXT,
    finished_at TEXT,
    picked_by TEXT,
    last_error TEXT,
    stdout TEXT,
    stderr TEXT,
    exit_code INTEGER
)
"#;

pub const CREATE_JOBS_READY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_ready
    ON jobs (priority DESC, run_at ASC, enqueued_at ASC, id ASC)
    WHERE state = 'pending'
"#;

pub const CREATE_JOBS_PROCESSING_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_jobs_processing ON jobs (picked_by) WHERE state = 'processing'
"#;

pub const CREATE_WORKERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS workers (
    id TEXT PRIMARY KEY,
    os_pid INTEGER NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('starting', 'running', 'stopping', 'stopped')),
    started_at TEXT NOT NULL,
    heartbeat_at TEXT NOT NULL,
    host TEXT NOT NULL
)
"#;

pub const CREATE_CONFIG_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS config (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    value_type TEXT NOT NULL CHECK (value_type IN ('int', 'float', 'str'))
)
"#;

pub async fn run_migrations(pool: &sqlx::SqlitePool) -> anyhow::Result<()> {
    sqlx::query(CREATE_JOBS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_JOBS_READY_INDEX).execute(pool).await?;
    sqlx::query(CREATE_JOBS_PROCESSING_INDEX)
        .execute(pool)
        .await?;
    sqlx::query(CREATE_WORKERS_TABLE).execute(pool).await?;
    sqlx::query(CREATE_CONFIG_TABLE).execute(pool).await?;
    Ok(())
}
