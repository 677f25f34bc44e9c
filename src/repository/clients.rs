//! Clients repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use super::limit_offset;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::non_blank,
        client::{Client, CreateClient},
        like_pattern, SearchQuery,
    },
};

#[derive(Clone)]
pub struct ClientsRepository {
    pool: SqlitePool,
}

impl ClientsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Active clients whose name or CPF matches, ordered by name
    pub async fn search(&self, query: &SearchQuery) -> AppResult<(Vec<Client>, i64)> {
        let pattern = like_pattern(query.search.as_deref());
        let (limit, offset) = limit_offset(query.page(), query.per_page());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM clients WHERE active = 1 AND (?1 IS NULL OR name LIKE ?1 OR cpf LIKE ?1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let clients = sqlx::query_as::<_, Client>(
            r#"
            SELECT * FROM clients
            WHERE active = 1 AND (?1 IS NULL OR name LIKE ?1 OR cpf LIKE ?1)
            ORDER BY name
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((clients, total))
    }

    /// Get active client by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Client> {
        sqlx::query_as::<_, Client>("SELECT * FROM clients WHERE id = ? AND active = 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Client not found".to_string()))
    }

    /// Whether an active client already has this CPF
    pub async fn cpf_exists(&self, cpf: &str) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE cpf = ? AND active = 1)",
        )
        .bind(cpf)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Whether another active client already has this phone number
    pub async fn phone_exists(&self, phone: &str, exclude_id: Option<i64>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM clients WHERE phone = ?1 AND active = 1 AND (?2 IS NULL OR id != ?2))",
        )
        .bind(phone)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    /// Insert a client; `cpf` must already be normalized
    pub async fn create(&self, client: CreateClient, now: DateTime<Utc>) -> AppResult<Client> {
        let created = sqlx::query_as::<_, Client>(
            r#"
            INSERT INTO clients (
                name, cpf, phone, address, street, number, neighborhood,
                city, state, zip_code, email, photo, active, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            RETURNING *
            "#,
        )
        .bind(&client.name)
        .bind(&client.cpf)
        .bind(&client.phone)
        .bind(non_blank(client.address))
        .bind(non_blank(client.street))
        .bind(non_blank(client.number))
        .bind(non_blank(client.neighborhood))
        .bind(non_blank(client.city))
        .bind(non_blank(client.state))
        .bind(non_blank(client.zip_code))
        .bind(non_blank(client.email))
        .bind(non_blank(client.photo))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    pub async fn update(&self, client: &Client) -> AppResult<Client> {
        let updated = sqlx::query_as::<_, Client>(
            r#"
            UPDATE clients SET
                name = ?, phone = ?, address = ?, street = ?, number = ?,
                neighborhood = ?, city = ?, state = ?, zip_code = ?, email = ?, photo = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.street)
        .bind(&client.number)
        .bind(&client.neighborhood)
        .bind(&client.city)
        .bind(&client.state)
        .bind(&client.zip_code)
        .bind(&client.email)
        .bind(&client.photo)
        .bind(client.id)
        .fetch_one(&self.pool)
        .await?;
        Ok(updated)
    }

    /// Soft-delete an active client holding no loan. Returns false, without
    /// writing, otherwise.
    pub async fn deactivate(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE clients SET active = 0
            WHERE id = ? AND active = 1
              AND NOT EXISTS (
                  SELECT 1 FROM loans WHERE loans.client_id = clients.id AND loans.return_date IS NULL
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn is_active(conn: &mut SqliteConnection, id: i64) -> AppResult<bool> {
        let active: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM clients WHERE id = ? AND active = 1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(active)
    }
}
