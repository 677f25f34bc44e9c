//! Business logic services

pub mod audit;
pub mod catalog;
pub mod clients;
pub mod loans;
pub mod settings;
pub mod users;

use std::sync::Arc;

use crate::{config::AuthConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub audit: audit::AuditService,
    pub catalog: catalog::CatalogService,
    pub clients: clients::ClientsService,
    pub loans: loans::LoansService,
    pub settings: settings::SettingsService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services, auditing into the `logs` table
    pub fn new(repository: Repository, auth_config: AuthConfig) -> Self {
        let log = Arc::new(audit::SqliteAuditLog::new(repository.audit.clone()));
        Self::with_audit(repository, auth_config, log)
    }

    /// Create all services with a custom audit sink
    pub fn with_audit(
        repository: Repository,
        auth_config: AuthConfig,
        log: Arc<dyn audit::AuditLog>,
    ) -> Self {
        let audit = audit::AuditService::new(log, repository.audit.clone());

        Self {
            catalog: catalog::CatalogService::new(repository.clone(), audit.clone()),
            clients: clients::ClientsService::new(repository.clone(), audit.clone()),
            loans: loans::LoansService::new(repository.clone(), audit.clone()),
            settings: settings::SettingsService::new(repository.clone(), audit.clone()),
            users: users::UsersService::new(repository, auth_config, audit.clone()),
            audit,
        }
    }
}
