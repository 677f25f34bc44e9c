//! Settings service

use super::audit::AuditService;
use crate::{
    error::AppResult,
    models::setting::{Settings, UpdateSettings},
    repository::Repository,
};

#[derive(Clone)]
pub struct SettingsService {
    repository: Repository,
    audit: AuditService,
}

impl SettingsService {
    pub fn new(repository: Repository, audit: AuditService) -> Self {
        Self { repository, audit }
    }

    /// Current settings, falling back to the defaults when nothing is stored
    pub async fn get_settings(&self) -> AppResult<Settings> {
        Ok(self.repository.settings.get().await?.unwrap_or_default())
    }

    /// Apply a partial update and store the result
    pub async fn update_settings(
        &self,
        actor_id: i64,
        update: UpdateSettings,
    ) -> AppResult<Settings> {
        let merged = self.get_settings().await?.merge(update);
        let saved = self.repository.settings.save(&merged).await?;

        tracing::info!(
            max_loans_per_client = saved.max_loans_per_client,
            loan_duration_days = saved.loan_duration_days,
            "Settings updated"
        );
        self.audit.record(actor_id, "UPDATE_SETTINGS".to_string()).await;

        Ok(saved)
    }
}
