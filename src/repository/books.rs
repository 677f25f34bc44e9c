//! Books repository for database operations
//!
//! Besides catalog CRUD this holds the inventory ledger primitives. Each of
//! them is a single guarded statement so the `0 <= available <= total`
//! bounds hold no matter how callers interleave.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};

use super::limit_offset;
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{non_blank, Book, BookDetails, BookQuery, CreateBook},
        like_pattern,
        loan::LoanDetails,
        page_of, per_page_of,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT b.*, a.name AS author_name, c.name AS category_name
    FROM books b
    LEFT JOIN authors a ON a.id = b.author_id
    LEFT JOIN categories c ON c.id = b.category_id
"#;

/// Columns that must be unique among active books
#[derive(Debug, Clone, Copy)]
pub enum UniqueField {
    Barcode,
    InventoryNumber,
    Isbn,
}

impl UniqueField {
    fn column(&self) -> &'static str {
        match self {
            UniqueField::Barcode => "barcode",
            UniqueField::InventoryNumber => "inventory_number",
            UniqueField::Isbn => "isbn",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UniqueField::Barcode => "Barcode",
            UniqueField::InventoryNumber => "Inventory number",
            UniqueField::Isbn => "ISBN",
        }
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: SqlitePool,
}

impl BooksRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Search active books with author and category names
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<BookDetails>, i64)> {
        let search = like_pattern(query.search.as_deref());
        let author_name = like_pattern(query.author_name.as_deref());
        let (limit, offset) = limit_offset(page_of(query.page), per_page_of(query.per_page));

        let filter = r#"
            WHERE b.active = 1
              AND (?1 IS NULL OR b.title LIKE ?1 OR b.barcode LIKE ?1
                   OR b.inventory_number LIKE ?1 OR b.isbn LIKE ?1)
              AND (?2 IS NULL OR b.author_id = ?2)
              AND (?3 IS NULL OR a.name LIKE ?3)
              AND (?4 IS NULL OR b.category_id = ?4)
        "#;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM books b LEFT JOIN authors a ON a.id = b.author_id {}",
            filter
        ))
        .bind(&search)
        .bind(query.author_id)
        .bind(&author_name)
        .bind(query.category_id)
        .fetch_one(&self.pool)
        .await?;

        let books = sqlx::query_as::<_, BookDetails>(&format!(
            "{} {} ORDER BY b.title LIMIT ?5 OFFSET ?6",
            DETAILS_SELECT, filter
        ))
        .bind(&search)
        .bind(query.author_id)
        .bind(&author_name)
        .bind(query.category_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Get active book by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = ? AND active = 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// Get active book with author and category names
    pub async fn get_details(&self, id: i64) -> AppResult<BookDetails> {
        sqlx::query_as::<_, BookDetails>(&format!(
            "{} WHERE b.id = ? AND b.active = 1",
            DETAILS_SELECT
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// Whether another active book already uses `value` for `field`
    pub async fn is_taken(
        &self,
        field: UniqueField,
        value: &str,
        exclude_id: Option<i64>,
    ) -> AppResult<bool> {
        let taken: bool = sqlx::query_scalar(&format!(
            "SELECT EXISTS(SELECT 1 FROM books WHERE {} = ? AND active = 1 AND (? IS NULL OR id != ?))",
            field.column()
        ))
        .bind(value)
        .bind(exclude_id)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    /// Insert a new book; every copy starts available
    pub async fn create(&self, book: CreateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (
                title, author_id, category_id, photo, origin, acquisition_type,
                total_quantity, available_quantity, barcode, inventory_number,
                edition, cover_type, isbn, active, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10, ?11, ?12, 1, ?13)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(book.author_id)
        .bind(book.category_id)
        .bind(non_blank(book.photo))
        .bind(non_blank(book.origin))
        .bind(book.acquisition_type)
        .bind(book.total_quantity)
        .bind(non_blank(book.barcode))
        .bind(non_blank(book.inventory_number))
        .bind(non_blank(book.edition))
        .bind(book.cover_type)
        .bind(non_blank(book.isbn))
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// Write the descriptive fields of a book (never its quantities)
    pub async fn update_details(conn: &mut SqliteConnection, book: &Book) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books SET
                title = ?, author_id = ?, category_id = ?, photo = ?, origin = ?,
                acquisition_type = ?, barcode = ?, inventory_number = ?, edition = ?,
                cover_type = ?, isbn = ?
            WHERE id = ?
            "#,
        )
        .bind(&book.title)
        .bind(book.author_id)
        .bind(book.category_id)
        .bind(&book.photo)
        .bind(&book.origin)
        .bind(book.acquisition_type)
        .bind(&book.barcode)
        .bind(&book.inventory_number)
        .bind(&book.edition)
        .bind(book.cover_type)
        .bind(&book.isbn)
        .bind(book.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Change the number of owned copies and rederive the available count
    /// from the loans still out
    pub async fn set_total_quantity(
        conn: &mut SqliteConnection,
        id: i64,
        total_quantity: i64,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books SET
                total_quantity = ?1,
                available_quantity = MAX(0, ?1 - (
                    SELECT COUNT(*) FROM loans
                    WHERE loans.book_id = books.id AND loans.return_date IS NULL
                ))
            WHERE id = ?2 AND active = 1
            "#,
        )
        .bind(total_quantity)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Take one copy off the shelf. Returns false, without writing, when the
    /// book is missing, inactive or has no copy left.
    pub async fn reserve_copy(conn: &mut SqliteConnection, id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET available_quantity = available_quantity - 1
            WHERE id = ? AND active = 1 AND available_quantity > 0
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Put one copy back, never beyond the owned total
    pub async fn release_copy(conn: &mut SqliteConnection, id: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books SET available_quantity = MIN(available_quantity + 1, total_quantity)
            WHERE id = ?
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn is_active(conn: &mut SqliteConnection, id: i64) -> AppResult<bool> {
        let active: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = ? AND active = 1)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        Ok(active)
    }

    /// Soft-delete an active book with no loan out. Returns false, without
    /// writing, otherwise.
    pub async fn deactivate(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE books SET active = 0
            WHERE id = ? AND active = 1
              AND NOT EXISTS (
                  SELECT 1 FROM loans WHERE loans.book_id = books.id AND loans.return_date IS NULL
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Every loan of the book, newest first
    pub async fn history(&self, id: i64) -> AppResult<Vec<LoanDetails>> {
        let loans = sqlx::query_as::<_, LoanDetails>(
            r#"
            SELECT l.*, c.name AS client_name, c.cpf AS client_cpf, b.title AS book_title
            FROM loans l
            LEFT JOIN clients c ON c.id = l.client_id
            LEFT JOIN books b ON b.id = l.book_id
            WHERE l.book_id = ?
            ORDER BY l.loan_date DESC, l.id DESC
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(loans)
    }
}
