//! Loans repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use super::limit_offset;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::BookCondition,
        like_pattern,
        loan::{Loan, LoanDetails, LoanQuery, PopularityEntry},
        page_of, per_page_of,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT l.*, c.name AS client_name, c.cpf AS client_cpf, b.title AS book_title
    FROM loans l
    LEFT JOIN clients c ON c.id = l.client_id
    LEFT JOIN books b ON b.id = l.book_id
"#;

/// Fields of a new loan row
#[derive(Debug, Clone)]
pub struct NewLoan<'a> {
    pub client_id: i64,
    pub book_id: i64,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub condition_on_loan: BookCondition,
    pub notes: Option<&'a str>,
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: SqlitePool,
}

impl LoansRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Loan not found".to_string()))
    }

    /// Get loan with client and book summary
    pub async fn get_details(&self, id: i64) -> AppResult<LoanDetails> {
        sqlx::query_as::<_, LoanDetails>(&format!("{} WHERE l.id = ?", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Loan not found".to_string()))
    }

    /// Filtered loan listing, newest first. `overdue_before` is the cutoff
    /// used by the `overdue` status.
    pub async fn search(
        &self,
        query: &LoanQuery,
        overdue_before: DateTime<Utc>,
    ) -> AppResult<(Vec<LoanDetails>, i64)> {
        let status = query.status.map(|s| s.as_str());
        let book = like_pattern(query.book_search.as_deref());
        let client = like_pattern(query.client_search.as_deref());
        let (limit, offset) = limit_offset(page_of(query.page), per_page_of(query.per_page));

        let filter = r#"
            WHERE (?1 IS NULL
                   OR (?1 = 'active' AND l.return_date IS NULL)
                   OR (?1 = 'returned' AND l.return_date IS NOT NULL)
                   OR (?1 = 'overdue' AND l.return_date IS NULL AND l.due_date < ?2))
              AND (?3 IS NULL OR b.title LIKE ?3)
              AND (?4 IS NULL OR c.name LIKE ?4 OR c.cpf LIKE ?4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            r#"
            SELECT COUNT(*) FROM loans l
            LEFT JOIN clients c ON c.id = l.client_id
            LEFT JOIN books b ON b.id = l.book_id
            {}
            "#,
            filter
        ))
        .bind(status)
        .bind(overdue_before)
        .bind(&book)
        .bind(&client)
        .fetch_one(&self.pool)
        .await?;

        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} {} ORDER BY l.loan_date DESC, l.id DESC LIMIT ?5 OFFSET ?6",
            DETAILS_SELECT, filter
        ))
        .bind(status)
        .bind(overdue_before)
        .bind(&book)
        .bind(&client)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((loans, total))
    }

    /// All loans of a client, newest first
    pub async fn by_client(&self, client_id: i64) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE l.client_id = ? ORDER BY l.loan_date DESC, l.id DESC",
            DETAILS_SELECT
        ))
        .bind(client_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Active loans due strictly before `before`, earliest first
    pub async fn overdue(&self, before: DateTime<Utc>) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            "{} WHERE l.return_date IS NULL AND l.due_date < ? ORDER BY l.due_date ASC, l.id ASC",
            DETAILS_SELECT
        ))
        .bind(before)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    /// Active loans due within `[from, until]`, earliest first
    pub async fn upcoming(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(&format!(
            r#"{}
            WHERE l.return_date IS NULL AND l.due_date >= ? AND l.due_date <= ?
            ORDER BY l.due_date ASC, l.id ASC
            LIMIT ?"#,
            DETAILS_SELECT
        ))
        .bind(from)
        .bind(until)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }

    // =========================================================================
    // Transactional primitives
    // =========================================================================

    pub async fn fetch(conn: &mut SqliteConnection, id: i64) -> AppResult<Option<Loan>> {
        let loan = sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(loan)
    }

    pub async fn count_active_for_client(
        conn: &mut SqliteConnection,
        client_id: i64,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE client_id = ? AND return_date IS NULL",
        )
        .bind(client_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    pub async fn insert(conn: &mut SqliteConnection, loan: NewLoan<'_>) -> AppResult<Loan> {
        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (client_id, book_id, loan_date, due_date, condition_on_loan, notes)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(loan.client_id)
        .bind(loan.book_id)
        .bind(loan.loan_date)
        .bind(loan.due_date)
        .bind(loan.condition_on_loan)
        .bind(loan.notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(created)
    }

    /// Close an active loan. Returns false, without writing, when the loan is
    /// missing or already returned. Existing notes are kept unless new ones
    /// are given.
    pub async fn mark_returned(
        conn: &mut SqliteConnection,
        id: i64,
        at: DateTime<Utc>,
        condition: BookCondition,
        notes: Option<&str>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE loans SET
                return_date = ?,
                condition_on_return = ?,
                notes = COALESCE(?, notes)
            WHERE id = ? AND return_date IS NULL
            "#,
        )
        .bind(at)
        .bind(condition)
        .bind(notes)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    // Popularity
    // =========================================================================

    async fn ranking(
        &self,
        sql: &str,
        filter_id: Option<i64>,
        limit: i64,
    ) -> AppResult<Vec<PopularityEntry>> {
        let mut query = sqlx::query_as::<_, PopularityEntry>(sql);
        if let Some(id) = filter_id {
            query = query.bind(id);
        }
        let entries = query.bind(limit).fetch_all(&self.pool).await?;
        Ok(entries)
    }

    pub async fn top_books(&self, limit: i64) -> AppResult<Vec<PopularityEntry>> {
        self.ranking(
            r#"
            SELECT b.id, b.title AS name, COUNT(l.id) AS loan_count
            FROM loans l JOIN books b ON b.id = l.book_id
            WHERE b.active = 1
            GROUP BY b.id, b.title
            ORDER BY loan_count DESC, name ASC
            LIMIT ?
            "#,
            None,
            limit,
        )
        .await
    }

    pub async fn top_authors(&self, limit: i64) -> AppResult<Vec<PopularityEntry>> {
        self.ranking(
            r#"
            SELECT a.id, a.name, COUNT(l.id) AS loan_count
            FROM loans l
            JOIN books b ON b.id = l.book_id
            JOIN authors a ON a.id = b.author_id
            WHERE a.active = 1
            GROUP BY a.id, a.name
            ORDER BY loan_count DESC, a.name ASC
            LIMIT ?
            "#,
            None,
            limit,
        )
        .await
    }

    pub async fn top_categories(&self, limit: i64) -> AppResult<Vec<PopularityEntry>> {
        self.ranking(
            r#"
            SELECT cat.id, cat.name, COUNT(l.id) AS loan_count
            FROM loans l
            JOIN books b ON b.id = l.book_id
            JOIN categories cat ON cat.id = b.category_id
            WHERE cat.active = 1
            GROUP BY cat.id, cat.name
            ORDER BY loan_count DESC, cat.name ASC
            LIMIT ?
            "#,
            None,
            limit,
        )
        .await
    }

    pub async fn top_clients(&self, limit: i64) -> AppResult<Vec<PopularityEntry>> {
        self.ranking(
            r#"
            SELECT c.id, c.name, COUNT(l.id) AS loan_count
            FROM loans l JOIN clients c ON c.id = l.client_id
            WHERE c.active = 1
            GROUP BY c.id, c.name
            ORDER BY loan_count DESC, c.name ASC
            LIMIT ?
            "#,
            None,
            limit,
        )
        .await
    }

    pub async fn top_books_by_author(
        &self,
        author_id: i64,
        limit: i64,
    ) -> AppResult<Vec<PopularityEntry>> {
        self.ranking(
            r#"
            SELECT b.id, b.title AS name, COUNT(l.id) AS loan_count
            FROM loans l JOIN books b ON b.id = l.book_id
            WHERE b.active = 1 AND b.author_id = ?
            GROUP BY b.id, b.title
            ORDER BY loan_count DESC, name ASC
            LIMIT ?
            "#,
            Some(author_id),
            limit,
        )
        .await
    }

    pub async fn top_books_by_category(
        &self,
        category_id: i64,
        limit: i64,
    ) -> AppResult<Vec<PopularityEntry>> {
        self.ranking(
            r#"
            SELECT b.id, b.title AS name, COUNT(l.id) AS loan_count
            FROM loans l JOIN books b ON b.id = l.book_id
            WHERE b.active = 1 AND b.category_id = ?
            GROUP BY b.id, b.title
            ORDER BY loan_count DESC, name ASC
            LIMIT ?
            "#,
            Some(category_id),
            limit,
        )
        .await
    }
}
