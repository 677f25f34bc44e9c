//! Audit trail
//!
//! Services record `ACTION:<id>` entries after their work has committed. A
//! failing audit sink is logged and otherwise ignored.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::{error::AppResult, models::audit::LogEntry, repository::audit::AuditRepository};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, user_id: i64, action: &str) -> AppResult<()>;
}

/// Audit log backed by the `logs` table
#[derive(Clone)]
pub struct SqliteAuditLog {
    repository: AuditRepository,
}

impl SqliteAuditLog {
    pub fn new(repository: AuditRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl AuditLog for SqliteAuditLog {
    async fn append(&self, user_id: i64, action: &str) -> AppResult<()> {
        self.repository.append(user_id, action, Utc::now()).await
    }
}

/// Read side of the trail plus the fire-and-forget writer shared by services
#[derive(Clone)]
pub struct AuditService {
    log: Arc<dyn AuditLog>,
    repository: AuditRepository,
}

impl AuditService {
    pub fn new(log: Arc<dyn AuditLog>, repository: AuditRepository) -> Self {
        Self { log, repository }
    }

    /// Append an entry; errors are reported through tracing only
    pub async fn record(&self, user_id: i64, action: String) {
        if let Err(e) = self.log.append(user_id, &action).await {
            tracing::warn!(user_id, action = %action, error = %e, "Failed to write audit log entry");
        }
    }

    pub async fn recent(&self, limit: i64) -> AppResult<Vec<LogEntry>> {
        self.repository.recent(limit.clamp(1, 500)).await
    }
}
