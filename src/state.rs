use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::config::Config;
use crate::error::{AppError, AppResult};

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
}

impl AppState {
    /// Run one unit of storage work on the blocking pool. Pool checkout and
    /// SQLite busy waits happen off the async workers, so request timeouts
    /// can still fire while the database is locked.
    pub async fn with_conn<T, F>(&self, work: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.db.clone();
        tokio::task::spawn_blocking(move || -> AppResult<T> {
            let conn = pool.get()?;
            work(&conn)
        })
        .await
        .map_err(|e| AppError::Internal(format!("storage task failed: {}", e)))?
    }
}
