//! Categories repository for database operations

use sqlx::SqlitePool;

use super::limit_offset;
use crate::{
    error::{AppError, AppResult},
    models::{category::Category, like_pattern, SearchQuery},
};

#[derive(Clone)]
pub struct CategoriesRepository {
    pool: SqlitePool,
}

impl CategoriesRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Active categories matching the search, ordered by name
    pub async fn search(&self, query: &SearchQuery) -> AppResult<(Vec<Category>, i64)> {
        let pattern = like_pattern(query.search.as_deref());
        let (limit, offset) = limit_offset(query.page(), query.per_page());

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories WHERE active = 1 AND (?1 IS NULL OR name LIKE ?1)",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT * FROM categories
            WHERE active = 1 AND (?1 IS NULL OR name LIKE ?1)
            ORDER BY name
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((categories, total))
    }

    /// Get active category by ID
    pub async fn get_by_id(&self, id: i64) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = ? AND active = 1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Category not found".to_string()))
    }

    /// Find by exact name, active or not
    pub async fn find_by_name(&self, name: &str) -> AppResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    pub async fn create(&self, name: &str) -> AppResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (name, active) VALUES (?, 1) RETURNING *",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    pub async fn reactivate(&self, id: i64, name: &str) -> AppResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET active = 1, name = ? WHERE id = ? RETURNING *",
        )
        .bind(name)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    pub async fn rename(&self, id: i64, name: &str) -> AppResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = ? WHERE id = ? RETURNING *",
        )
        .bind(name)
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    /// Soft-delete when no active book references it. Returns false, without
    /// writing, otherwise.
    pub async fn deactivate(&self, id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE categories SET active = 0
            WHERE id = ? AND active = 1
              AND NOT EXISTS (
                  SELECT 1 FROM books WHERE books.category_id = categories.id AND books.active = 1
              )
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Titles of the active books in this category
    pub async fn active_book_titles(&self, id: i64) -> AppResult<Vec<String>> {
        let titles = sqlx::query_scalar(
            "SELECT title FROM books WHERE category_id = ? AND active = 1 ORDER BY title",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(titles)
    }
}
