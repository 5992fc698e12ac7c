pub mod comments;
pub mod follows;
pub mod likes;
pub mod models;
pub mod posts;
pub mod users;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::state::DbPool;

pub const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial",
    include_str!("../../migrations/001_initial.sql"),
)];

/// Pragmas every pooled connection needs. `foreign_keys` is per-connection in
/// SQLite, so cascades only work if each connection sets it.
const CONNECTION_PRAGMAS: &str = "
    PRAGMA foreign_keys = ON;
    PRAGMA busy_timeout = 5000;
";

/// Failures surfaced by the data-access layer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("SQL error: {0}")]
    Sql(#[from] rusqlite::Error),

    #[error("Not found: {0}")]
    NotFound(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Conflict: {0}")]
    Conflict(&'static str),

    #[error("Invalid: {0}")]
    Invalid(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A clamped limit/offset window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub fn new(limit: i64, offset: i64) -> Self {
        Self { limit, offset }
    }

    /// Build a page from raw query-string values. Bad input never fails: an
    /// unparseable value takes the default, anything out of range is clamped.
    pub fn clamped(
        limit: Option<&str>,
        offset: Option<&str>,
        default_limit: i64,
        max_limit: i64,
    ) -> Self {
        let max_limit = max_limit.max(1);
        let limit = limit
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(default_limit)
            .clamp(1, max_limit);
        let offset = offset
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0)
            .max(0);
        Self { limit, offset }
    }
}

pub fn create_pool(db_path: &Path, config: &DatabaseConfig) -> anyhow::Result<DbPool> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager =
        SqliteConnectionManager::file(db_path).with_init(|c| c.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder()
        .max_size(config.pool_size.max(1))
        .connection_timeout(Duration::from_secs(config.connection_timeout_secs.max(1)))
        .build(manager)?;

    // WAL is persistent on the file, so setting it once is enough
    let conn = pool.get()?;
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        ",
    )?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> anyhow::Result<()> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            name TEXT PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM schema_version WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        if !already_applied {
            tracing::info!("Applying migration: {}", name);
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(sql)?;
            tx.execute(
                "INSERT INTO schema_version (name) VALUES (?1)",
                params![name],
            )?;
            tx.commit()?;
        }
    }

    tracing::info!("Database migrations complete");
    Ok(())
}

/// Map a UNIQUE constraint failure on `column` (e.g. `users.email`) to a
/// conflict; every other error passes through unchanged.
pub(crate) fn unique_violation(
    err: rusqlite::Error,
    column: &str,
    message: &'static str,
) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref e, Some(ref msg)) = err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation
            && msg.contains("UNIQUE")
            && msg.contains(column)
        {
            return StoreError::Conflict(message);
        }
    }
    StoreError::Sql(err)
}

#[cfg(test)]
pub(crate) fn test_pool() -> DbPool {
    let manager = SqliteConnectionManager::memory().with_init(|c| c.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(1).build(manager).unwrap();
    run_migrations(&pool).unwrap();
    pool
}

#[cfg(test)]
pub(crate) mod fixtures {
    use rusqlite::{params, Connection};

    pub fn user(conn: &Connection, username: &str) -> i64 {
        conn.execute(
            "INSERT INTO users (username, email, password_hash) VALUES (?1, ?2, 'x')",
            params![username, format!("{}@example.com", username)],
        )
        .unwrap();
        conn.last_insert_rowid()
    }

    /// Insert a post with an explicit timestamp so ordering is deterministic.
    pub fn post_at(conn: &Connection, user_id: i64, content: &str, created_at: &str) -> i64 {
        conn.execute(
            "INSERT INTO posts (user_id, content, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
            params![user_id, content, created_at],
        )
        .unwrap();
        conn.last_insert_rowid()
    }
}
