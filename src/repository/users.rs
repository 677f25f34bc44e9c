//! Users repository for database operations

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::limit_offset;
use crate::{
    error::{AppError, AppResult},
    models::{enums::Role, like_pattern, user::User, SearchQuery},
};

/// Fields of a new user row; the password is already hashed
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub cpf: &'a str,
    pub phone: &'a str,
    pub address: &'a str,
    pub email: Option<&'a str>,
    pub photo: Option<&'a str>,
    pub role: Role,
    pub password_hash: &'a str,
}

#[derive(Clone)]
pub struct UsersRepository {
    pool: SqlitePool,
}

impl UsersRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get user by ID (active or not)
    pub async fn get_by_id(&self, id: i64) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Get user by normalized CPF (login identifier)
    pub async fn get_by_cpf(&self, cpf: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE cpf = ?")
            .bind(cpf)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// Users whose name or CPF matches, ordered by name
    pub async fn list(&self, query: &SearchQuery) -> AppResult<(Vec<User>, i64)> {
        let pattern = like_pattern(query.search.as_deref());
        let (limit, offset) = limit_offset(query.page(), query.per_page());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE ?1 IS NULL OR name LIKE ?1 OR cpf LIKE ?1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ?1 IS NULL OR name LIKE ?1 OR cpf LIKE ?1
            ORDER BY name
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total))
    }

    pub async fn count(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn create(&self, user: NewUser<'_>, now: DateTime<Utc>) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, cpf, phone, address, email, photo, role, password_hash, active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 1, ?)
            RETURNING *
            "#,
        )
        .bind(user.name)
        .bind(user.cpf)
        .bind(user.phone)
        .bind(user.address)
        .bind(user.email)
        .bind(user.photo)
        .bind(user.role)
        .bind(user.password_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Persist every mutable column of `user`
    pub async fn update(&self, user: &User) -> AppResult<User> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = ?, cpf = ?, phone = ?, address = ?, email = ?, photo = ?,
                role = ?, password_hash = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&user.name)
        .bind(&user.cpf)
        .bind(&user.phone)
        .bind(&user.address)
        .bind(&user.email)
        .bind(&user.photo)
        .bind(user.role)
        .bind(&user.password_hash)
        .bind(user.id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
        Ok(updated)
    }

    pub async fn set_active(&self, id: i64, active: bool) -> AppResult<User> {
        sqlx::query_as::<_, User>("UPDATE users SET active = ? WHERE id = ? RETURNING *")
            .bind(active)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn delete(&self, id: i64) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("User not found".to_string()));
        }
        Ok(())
    }
}
