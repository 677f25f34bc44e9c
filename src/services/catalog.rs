//! Catalog management service: authors, categories and books

use chrono::Utc;

use super::audit::AuditService;
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        author::{Author, AuthorRequest},
        book::{Book, BookDetails, BookQuery, CreateBook, UpdateBook},
        category::{Category, CategoryRequest},
        loan::LoanDetails,
        SearchQuery,
    },
    repository::{
        books::{BooksRepository, UniqueField},
        Repository,
    },
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    audit: AuditService,
}

impl CatalogService {
    pub fn new(repository: Repository, audit: AuditService) -> Self {
        Self { repository, audit }
    }

    // =========================================================================
    // Authors
    // =========================================================================

    pub async fn search_authors(&self, query: &SearchQuery) -> AppResult<(Vec<Author>, i64)> {
        self.repository.authors.search(query).await
    }

    pub async fn get_author(&self, id: i64) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await
    }

    /// Create an author, or bring back a deleted one with the same name
    pub async fn create_author(&self, actor_id: i64, request: AuthorRequest) -> AppResult<Author> {
        let name = request.name.trim();

        let author = match self.repository.authors.find_by_name(name).await? {
            Some(existing) if existing.active => {
                return Err(AppError::Conflict("Author already exists".to_string()))
            }
            Some(existing) => {
                let author = self.repository.authors.reactivate(existing.id, name).await?;
                self.audit
                    .record(actor_id, format!("REACTIVATE_AUTHOR:{}", author.id))
                    .await;
                author
            }
            None => {
                let author = self.repository.authors.create(name).await?;
                self.audit
                    .record(actor_id, format!("CREATE_AUTHOR:{}", author.id))
                    .await;
                author
            }
        };

        Ok(author)
    }

    pub async fn update_author(
        &self,
        actor_id: i64,
        id: i64,
        request: AuthorRequest,
    ) -> AppResult<Author> {
        self.repository.authors.get_by_id(id).await?;
        let name = request.name.trim();

        if let Some(existing) = self.repository.authors.find_by_name(name).await? {
            if existing.id != id {
                return Err(AppError::Conflict("Author name already exists".to_string()));
            }
        }

        let author = self.repository.authors.rename(id, name).await?;
        self.audit.record(actor_id, format!("UPDATE_AUTHOR:{}", id)).await;
        Ok(author)
    }

    pub async fn delete_author(&self, actor_id: i64, id: i64) -> AppResult<()> {
        self.repository.authors.get_by_id(id).await?;

        if !self.repository.authors.deactivate(id).await? {
            let titles = self.repository.authors.active_book_titles(id).await?;
            return Err(AppError::BusinessRule(
                ErrorCode::HasActiveBooks,
                format!(
                    "Cannot delete author with associated books: {}",
                    titles.join(", ")
                ),
            ));
        }

        self.audit.record(actor_id, format!("DELETE_AUTHOR:{}", id)).await;
        Ok(())
    }

    // =========================================================================
    // Categories
    // =========================================================================

    pub async fn search_categories(
        &self,
        query: &SearchQuery,
    ) -> AppResult<(Vec<Category>, i64)> {
        self.repository.categories.search(query).await
    }

    pub async fn get_category(&self, id: i64) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await
    }

    /// Create a category, or bring back a deleted one with the same name
    pub async fn create_category(
        &self,
        actor_id: i64,
        request: CategoryRequest,
    ) -> AppResult<Category> {
        let name = request.name.trim();

        let category = match self.repository.categories.find_by_name(name).await? {
            Some(existing) if existing.active => {
                return Err(AppError::Conflict("Category already exists".to_string()))
            }
            Some(existing) => {
                let category = self.repository.categories.reactivate(existing.id, name).await?;
                self.audit
                    .record(actor_id, format!("REACTIVATE_CATEGORY:{}", category.id))
                    .await;
                category
            }
            None => {
                let category = self.repository.categories.create(name).await?;
                self.audit
                    .record(actor_id, format!("CREATE_CATEGORY:{}", category.id))
                    .await;
                category
            }
        };

        Ok(category)
    }

    pub async fn update_category(
        &self,
        actor_id: i64,
        id: i64,
        request: CategoryRequest,
    ) -> AppResult<Category> {
        self.repository.categories.get_by_id(id).await?;
        let name = request.name.trim();

        if let Some(existing) = self.repository.categories.find_by_name(name).await? {
            if existing.id != id {
                return Err(AppError::Conflict("Category name already exists".to_string()));
            }
        }

        let category = self.repository.categories.rename(id, name).await?;
        self.audit
            .record(actor_id, format!("UPDATE_CATEGORY:{}", id))
            .await;
        Ok(category)
    }

    pub async fn delete_category(&self, actor_id: i64, id: i64) -> AppResult<()> {
        self.repository.categories.get_by_id(id).await?;

        if !self.repository.categories.deactivate(id).await? {
            let titles = self.repository.categories.active_book_titles(id).await?;
            return Err(AppError::BusinessRule(
                ErrorCode::HasActiveBooks,
                format!(
                    "Cannot delete category with associated books: {}",
                    titles.join(", ")
                ),
            ));
        }

        self.audit
            .record(actor_id, format!("DELETE_CATEGORY:{}", id))
            .await;
        Ok(())
    }

    // =========================================================================
    // Books
    // =========================================================================

    pub async fn search_books(&self, query: &BookQuery) -> AppResult<(Vec<BookDetails>, i64)> {
        self.repository.books.search(query).await
    }

    pub async fn get_book(&self, id: i64) -> AppResult<BookDetails> {
        self.repository.books.get_details(id).await
    }

    /// Every loan of the book, newest first
    pub async fn book_history(&self, id: i64) -> AppResult<Vec<LoanDetails>> {
        self.repository.books.get_by_id(id).await?;
        self.repository.books.history(id).await
    }

    pub async fn create_book(&self, actor_id: i64, book: CreateBook) -> AppResult<BookDetails> {
        self.repository.authors.get_by_id(book.author_id).await?;
        self.repository.categories.get_by_id(book.category_id).await?;
        self.check_unique(
            &[
                (UniqueField::Barcode, book.barcode.as_deref()),
                (UniqueField::InventoryNumber, book.inventory_number.as_deref()),
                (UniqueField::Isbn, book.isbn.as_deref()),
            ],
            None,
        )
        .await?;

        let created = self.repository.books.create(book, Utc::now()).await?;
        tracing::info!(book_id = created.id, title = %created.title, "Book created");
        self.audit
            .record(actor_id, format!("CREATE_BOOK:{}", created.id))
            .await;

        self.repository.books.get_details(created.id).await
    }

    /// Update a book. A new `total_quantity` rederives the available count
    /// from the loans currently out.
    pub async fn update_book(
        &self,
        actor_id: i64,
        id: i64,
        update: UpdateBook,
    ) -> AppResult<BookDetails> {
        let current = self.repository.books.get_by_id(id).await?;
        let new_total = update
            .total_quantity
            .filter(|total| *total != current.total_quantity);

        if let Some(author_id) = update.author_id {
            self.repository.authors.get_by_id(author_id).await?;
        }
        if let Some(category_id) = update.category_id {
            self.repository.categories.get_by_id(category_id).await?;
        }

        let merged: Book = current.merge(update);
        self.check_unique(
            &[
                (UniqueField::Barcode, merged.barcode.as_deref()),
                (UniqueField::InventoryNumber, merged.inventory_number.as_deref()),
                (UniqueField::Isbn, merged.isbn.as_deref()),
            ],
            Some(id),
        )
        .await?;

        let mut tx = self.repository.pool.begin().await?;
        if let Some(total) = new_total {
            BooksRepository::set_total_quantity(&mut tx, id, total).await?;
        }
        BooksRepository::update_details(&mut tx, &merged).await?;
        tx.commit().await?;

        self.audit.record(actor_id, format!("UPDATE_BOOK:{}", id)).await;
        self.repository.books.get_details(id).await
    }

    /// Soft-delete a book that has no loan out
    pub async fn delete_book(&self, actor_id: i64, id: i64) -> AppResult<()> {
        self.repository.books.get_by_id(id).await?;

        if !self.repository.books.deactivate(id).await? {
            return Err(AppError::BusinessRule(
                ErrorCode::HasActiveLoans,
                "Cannot delete book with active loans".to_string(),
            ));
        }

        tracing::info!(book_id = id, "Book deleted");
        self.audit.record(actor_id, format!("DELETE_BOOK:{}", id)).await;
        Ok(())
    }

    async fn check_unique(
        &self,
        fields: &[(UniqueField, Option<&str>)],
        exclude_id: Option<i64>,
    ) -> AppResult<()> {
        for (field, value) in fields {
            let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
                continue;
            };
            if self.repository.books.is_taken(*field, value, exclude_id).await? {
                return Err(AppError::Conflict(format!("{} already exists", field.label())));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        models::{enums::BookCondition, loan::CreateLoan},
        services::{audit::SqliteAuditLog, loans::LoansService},
        test_support::{memory_repository, seed_book, seed_client},
    };

    fn audit(repository: &Repository) -> AuditService {
        AuditService::new(
            Arc::new(SqliteAuditLog::new(repository.audit.clone())),
            repository.audit.clone(),
        )
    }

    fn name(name: &str) -> AuthorRequest {
        AuthorRequest {
            name: name.to_string(),
        }
    }

    async fn lend(repository: &Repository, client_id: i64, book_id: i64) -> i64 {
        LoansService::new(repository.clone(), audit(repository))
            .create_loan(
                1,
                CreateLoan {
                    client_id,
                    book_id,
                    condition_on_loan: BookCondition::New,
                    notes: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_deleted_author_is_reactivated_on_create() {
        let repository = memory_repository().await;
        let catalog = CatalogService::new(repository.clone(), audit(&repository));

        let author = catalog.create_author(1, name("Clarice Lispector")).await.unwrap();
        catalog.delete_author(1, author.id).await.unwrap();
        assert!(catalog.get_author(author.id).await.is_err());

        let again = catalog.create_author(1, name("Clarice Lispector")).await.unwrap();
        assert_eq!(again.id, author.id);
        assert!(again.active);

        let duplicate = catalog.create_author(1, name("Clarice Lispector")).await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_author_with_active_books_cannot_be_deleted() {
        let repository = memory_repository().await;
        let catalog = CatalogService::new(repository.clone(), audit(&repository));
        let book = seed_book(&repository, "Dom Casmurro", 1).await;

        let result = catalog.delete_author(1, book.author_id).await;
        match result {
            Err(AppError::BusinessRule(ErrorCode::HasActiveBooks, message)) => {
                assert!(message.contains("Dom Casmurro"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(catalog.get_author(book.author_id).await.is_ok());
    }

    #[tokio::test]
    async fn test_quantity_edit_recomputes_availability() {
        let repository = memory_repository().await;
        let catalog = CatalogService::new(repository.clone(), audit(&repository));
        let book = seed_book(&repository, "Dom Casmurro", 3).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;
        lend(&repository, client.id, book.id).await;
        lend(&repository, client.id, book.id).await;

        let grown = catalog
            .update_book(
                1,
                book.id,
                UpdateBook {
                    total_quantity: Some(5),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(grown.book.total_quantity, 5);
        assert_eq!(grown.book.available_quantity, 3);

        // Fewer copies than loans out: nothing left on the shelf
        let shrunk = catalog
            .update_book(
                1,
                book.id,
                UpdateBook {
                    total_quantity: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(shrunk.book.total_quantity, 1);
        assert_eq!(shrunk.book.available_quantity, 0);
    }

    #[tokio::test]
    async fn test_book_with_active_loan_cannot_be_deleted() {
        let repository = memory_repository().await;
        let catalog = CatalogService::new(repository.clone(), audit(&repository));
        let book = seed_book(&repository, "Dom Casmurro", 1).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;
        lend(&repository, client.id, book.id).await;

        let result = catalog.delete_book(1, book.id).await;
        assert!(matches!(
            result,
            Err(AppError::BusinessRule(ErrorCode::HasActiveLoans, _))
        ));
        assert!(catalog.get_book(book.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_isbn_is_rejected() {
        let repository = memory_repository().await;
        let catalog = CatalogService::new(repository.clone(), audit(&repository));
        let first = seed_book(&repository, "Dom Casmurro", 1).await;
        catalog
            .update_book(
                1,
                first.id,
                UpdateBook {
                    isbn: Some("9788535910663".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let second = seed_book(&repository, "Helena", 1).await;

        let result = catalog
            .update_book(
                1,
                second.id,
                UpdateBook {
                    isbn: Some("9788535910663".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::Conflict(m)) if m == "ISBN already exists"));
    }

    #[tokio::test]
    async fn test_search_joins_names() {
        let repository = memory_repository().await;
        let catalog = CatalogService::new(repository.clone(), audit(&repository));
        seed_book(&repository, "Dom Casmurro", 1).await;
        seed_book(&repository, "Helena", 1).await;

        let (books, total) = catalog
            .search_books(&BookQuery {
                search: Some("casm".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(books[0].author_name.as_deref(), Some("Machado de Assis"));
        assert_eq!(books[0].category_name.as_deref(), Some("Romance"));

        let (_, by_author) = catalog
            .search_books(&BookQuery {
                author_name: Some("machado".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(by_author, 2);
    }
}
