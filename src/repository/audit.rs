//! Audit log repository (append-only)

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::{error::AppResult, models::audit::LogEntry};

#[derive(Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one entry
    pub async fn append(&self, user_id: i64, action: &str, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("INSERT INTO logs (user_id, action, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(action)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Most recent entries first
    pub async fn recent(&self, limit: i64) -> AppResult<Vec<LogEntry>> {
        let entries = sqlx::query_as::<_, LogEntry>(
            "SELECT * FROM logs ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}
