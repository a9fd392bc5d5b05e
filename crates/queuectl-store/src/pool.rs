//! Opens the crash-safe embedded Store: a single SQLite file in WAL mode,
//! shared by every process that points `QUEUECTL_DB` at the same path.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;

use crate::schema::run_migrations;

/// Connect to (creating if absent) the SQLite database at `path`, enable
/// WAL so readers never block writers, and apply the schema.
pub async fn connect(path: &str) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}
