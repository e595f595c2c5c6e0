//! Session store backed by the `session_state` table.

use async_trait::async_trait;
use nooverfit_pipeline::{PipelineError, PipelineResult, SessionStore};
use sqlx::{Row, SqlitePool};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage_error(err: sqlx::Error) -> PipelineError {
    PipelineError::storage(err.to_string())
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, key: &str) -> PipelineResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM session_state WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        row.map(|row| row.try_get::<String, _>("value"))
            .transpose()
            .map_err(storage_error)
    }

    async fn put(&self, key: &str, value: &str) -> PipelineResult<()> {
        let now = chrono::Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO session_state (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;

        debug!(key, bytes = value.len(), "session state written");
        Ok(())
    }
}
