//! Settings repository (single row, id = 1)

use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::AppResult,
    models::setting::{LoanPolicy, Settings},
};

#[derive(Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// The stored settings, if the row exists
    pub async fn get(&self) -> AppResult<Option<Settings>> {
        let settings = sqlx::query_as::<_, Settings>(
            r#"
            SELECT max_loans_per_client, loan_duration_days, library_name, library_logo, sidebar_color
            FROM settings WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(settings)
    }

    /// Lending rules as seen from inside a transaction
    pub async fn loan_policy(conn: &mut SqliteConnection) -> AppResult<Option<LoanPolicy>> {
        let policy = sqlx::query_as::<_, LoanPolicy>(
            "SELECT max_loans_per_client, loan_duration_days FROM settings WHERE id = 1",
        )
        .fetch_optional(&mut *conn)
        .await?;
        Ok(policy)
    }

    /// Insert or replace the singleton row
    pub async fn save(&self, settings: &Settings) -> AppResult<Settings> {
        let saved = sqlx::query_as::<_, Settings>(
            r#"
            INSERT INTO settings (id, max_loans_per_client, loan_duration_days, library_name, library_logo, sidebar_color)
            VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                max_loans_per_client = excluded.max_loans_per_client,
                loan_duration_days = excluded.loan_duration_days,
                library_name = excluded.library_name,
                library_logo = excluded.library_logo,
                sidebar_color = excluded.sidebar_color
            RETURNING max_loans_per_client, loan_duration_days, library_name, library_logo, sidebar_color
            "#,
        )
        .bind(settings.max_loans_per_client)
        .bind(settings.loan_duration_days)
        .bind(&settings.library_name)
        .bind(&settings.library_logo)
        .bind(&settings.sidebar_color)
        .fetch_one(&self.pool)
        .await?;
        Ok(saved)
    }
}
