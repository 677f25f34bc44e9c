//! Audit log entries

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

/// One append-only audit record, e.g. `CREATE_LOAN:42`
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LogEntry {
    pub id: i64,
    pub user_id: i64,
    pub action: String,
    pub created_at: DateTime<Utc>,
}
