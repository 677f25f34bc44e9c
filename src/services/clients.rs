//! Client (borrower) management service

use chrono::Utc;

use super::audit::AuditService;
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        client::{Client, CreateClient, UpdateClient},
        validation::normalize_cpf,
        SearchQuery,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ClientsService {
    repository: Repository,
    audit: AuditService,
}

impl ClientsService {
    pub fn new(repository: Repository, audit: AuditService) -> Self {
        Self { repository, audit }
    }

    pub async fn search(&self, query: &SearchQuery) -> AppResult<(Vec<Client>, i64)> {
        self.repository.clients.search(query).await
    }

    pub async fn get(&self, id: i64) -> AppResult<Client> {
        self.repository.clients.get_by_id(id).await
    }

    /// Register a client; CPF and phone must be unique among active clients
    pub async fn create(&self, actor_id: i64, mut client: CreateClient) -> AppResult<Client> {
        client.cpf = normalize_cpf(&client.cpf);
        client.phone = client.phone.trim().to_string();

        if self.repository.clients.cpf_exists(&client.cpf).await? {
            return Err(AppError::Conflict("CPF already registered".to_string()));
        }
        if self.repository.clients.phone_exists(&client.phone, None).await? {
            return Err(AppError::Conflict("Phone already registered".to_string()));
        }

        let created = self.repository.clients.create(client, Utc::now()).await?;
        self.audit
            .record(actor_id, format!("CREATE_CLIENT:{}", created.id))
            .await;
        Ok(created)
    }

    pub async fn update(&self, actor_id: i64, id: i64, update: UpdateClient) -> AppResult<Client> {
        let current = self.repository.clients.get_by_id(id).await?;
        let mut merged = current.merge(update);
        merged.phone = merged.phone.trim().to_string();

        if self
            .repository
            .clients
            .phone_exists(&merged.phone, Some(id))
            .await?
        {
            return Err(AppError::Conflict("Phone already registered".to_string()));
        }

        let updated = self.repository.clients.update(&merged).await?;
        self.audit.record(actor_id, format!("UPDATE_CLIENT:{}", id)).await;
        Ok(updated)
    }

    /// Soft-delete a client holding no loan
    pub async fn delete(&self, actor_id: i64, id: i64) -> AppResult<()> {
        self.repository.clients.get_by_id(id).await?;

        if !self.repository.clients.deactivate(id).await? {
            return Err(AppError::BusinessRule(
                ErrorCode::HasActiveLoans,
                "Cannot delete client with active loans".to_string(),
            ));
        }

        self.audit.record(actor_id, format!("DELETE_CLIENT:{}", id)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        services::audit::SqliteAuditLog,
        test_support::{memory_repository, seed_client},
    };

    fn service(repository: &Repository) -> ClientsService {
        let audit = AuditService::new(
            Arc::new(SqliteAuditLog::new(repository.audit.clone())),
            repository.audit.clone(),
        );
        ClientsService::new(repository.clone(), audit)
    }

    fn request(cpf: &str, phone: &str) -> CreateClient {
        CreateClient {
            name: "Carla".to_string(),
            cpf: cpf.to_string(),
            phone: phone.to_string(),
            address: None,
            street: None,
            number: None,
            neighborhood: None,
            city: Some("Recife".to_string()),
            state: Some("PE".to_string()),
            zip_code: None,
            email: None,
            photo: None,
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_cpf() {
        let repository = memory_repository().await;
        let clients = service(&repository);

        let client = clients
            .create(1, request("529.982.247-25", "81999990000"))
            .await
            .unwrap();
        assert_eq!(client.cpf, "52998224725");

        let duplicate = clients.create(1, request("52998224725", "81988880000")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(m)) if m == "CPF already registered"));
    }

    #[tokio::test]
    async fn test_duplicate_phone_is_rejected() {
        let repository = memory_repository().await;
        let clients = service(&repository);
        clients
            .create(1, request("52998224725", "81999990000"))
            .await
            .unwrap();

        let duplicate = clients.create(1, request("11144477735", "81999990000")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(m)) if m == "Phone already registered"));
    }

    #[tokio::test]
    async fn test_deleted_client_frees_cpf() {
        let repository = memory_repository().await;
        let clients = service(&repository);
        let client = seed_client(&repository, "Ana", "52998224725").await;

        clients.delete(1, client.id).await.unwrap();
        assert!(matches!(clients.get(client.id).await, Err(AppError::NotFound(_))));

        let again = clients
            .create(1, request("52998224725", "81977770000"))
            .await
            .unwrap();
        assert_ne!(again.id, client.id);
    }

    #[tokio::test]
    async fn test_update_keeps_absent_fields() {
        let repository = memory_repository().await;
        let clients = service(&repository);
        let client = clients
            .create(1, request("52998224725", "81999990000"))
            .await
            .unwrap();

        let updated = clients
            .update(
                1,
                client.id,
                UpdateClient {
                    name: Some("Carla Souza".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Carla Souza");
        assert_eq!(updated.city.as_deref(), Some("Recife"));
    }
}
