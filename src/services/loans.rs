//! Loan lifecycle service
//!
//! Checkout and return each run in one transaction whose first statement is
//! the guarded write on the contended row. SQLite grants the write lock to
//! that statement, so concurrent requests for the last copy are serialized
//! and every later check sees committed state.

use chrono::{Duration, Utc};

use super::audit::AuditService;
use crate::{
    error::{AppError, AppResult, ErrorCode},
    models::{
        book::non_blank,
        loan::{
            start_of_day, CreateLoan, Loan, LoanDetails, LoanQuery, PopularityEntry, ReturnLoan,
            TopQuery, UpcomingQuery,
        },
    },
    repository::{
        books::BooksRepository,
        clients::ClientsRepository,
        loans::{LoansRepository, NewLoan},
        settings::SettingsRepository,
        Repository,
    },
};

const DEFAULT_UPCOMING_DAYS: i64 = 30;
const DEFAULT_UPCOMING_LIMIT: i64 = 10;
const MAX_UPCOMING_DAYS: i64 = 3650;
const DEFAULT_TOP_LIMIT: i64 = 10;
const DEFAULT_TOP_BOOKS_LIMIT: i64 = 5;
const MAX_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    audit: AuditService,
}

impl LoansService {
    pub fn new(repository: Repository, audit: AuditService) -> Self {
        Self { repository, audit }
    }

    /// Lend one copy of a book to a client
    pub async fn create_loan(&self, actor_id: i64, request: CreateLoan) -> AppResult<Loan> {
        let now = Utc::now();
        let notes = non_blank(request.notes);
        let mut tx = self.repository.pool.begin().await?;

        let reserved = BooksRepository::reserve_copy(&mut tx, request.book_id).await?;

        if !ClientsRepository::is_active(&mut tx, request.client_id).await? {
            return Err(AppError::NotFound("Client not found".to_string()));
        }
        if !reserved {
            if !BooksRepository::is_active(&mut tx, request.book_id).await? {
                return Err(AppError::NotFound("Book not found".to_string()));
            }
            return Err(AppError::BusinessRule(
                ErrorCode::BookNotAvailable,
                "Book is not available".to_string(),
            ));
        }

        let policy = SettingsRepository::loan_policy(&mut tx)
            .await?
            .unwrap_or_default();
        let active_loans =
            LoansRepository::count_active_for_client(&mut tx, request.client_id).await?;
        if active_loans >= policy.max_loans_per_client {
            return Err(AppError::BusinessRule(
                ErrorCode::MaxLoansReached,
                format!(
                    "Client has reached the maximum loan limit ({})",
                    policy.max_loans_per_client
                ),
            ));
        }

        let due_date = Duration::try_days(policy.loan_duration_days)
            .and_then(|duration| now.checked_add_signed(duration))
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "Loan duration of {} days is out of range",
                    policy.loan_duration_days
                ))
            })?;

        let loan = LoansRepository::insert(
            &mut tx,
            NewLoan {
                client_id: request.client_id,
                book_id: request.book_id,
                loan_date: now,
                due_date,
                condition_on_loan: request.condition_on_loan,
                notes: notes.as_deref(),
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            client_id = loan.client_id,
            book_id = loan.book_id,
            due_date = %loan.due_date,
            "Loan created"
        );
        self.audit
            .record(actor_id, format!("CREATE_LOAN:{}", loan.id))
            .await;

        Ok(loan)
    }

    /// Close a loan and put the copy back on the shelf
    pub async fn return_loan(
        &self,
        actor_id: i64,
        loan_id: i64,
        request: ReturnLoan,
    ) -> AppResult<Loan> {
        let now = Utc::now();
        let notes = non_blank(request.notes);
        let mut tx = self.repository.pool.begin().await?;

        let closed = LoansRepository::mark_returned(
            &mut tx,
            loan_id,
            now,
            request.condition_on_return,
            notes.as_deref(),
        )
        .await?;

        let loan = LoansRepository::fetch(&mut tx, loan_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Loan not found".to_string()))?;
        if !closed {
            return Err(AppError::BusinessRule(
                ErrorCode::AlreadyReturned,
                "Loan already returned".to_string(),
            ));
        }

        BooksRepository::release_copy(&mut tx, loan.book_id).await?;
        tx.commit().await?;

        tracing::info!(loan_id = loan.id, book_id = loan.book_id, "Loan returned");
        self.audit
            .record(actor_id, format!("RETURN_LOAN:{}", loan.id))
            .await;

        Ok(loan)
    }

    pub async fn get_loan(&self, id: i64) -> AppResult<LoanDetails> {
        self.repository.loans.get_details(id).await
    }

    pub async fn list_loans(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        self.repository
            .loans
            .search(query, start_of_day(Utc::now()))
            .await
    }

    pub async fn client_loans(&self, client_id: i64) -> AppResult<Vec<LoanDetails>> {
        self.repository.loans.by_client(client_id).await
    }

    /// Active loans due before today
    pub async fn overdue(&self) -> AppResult<Vec<LoanDetails>> {
        self.repository
            .loans
            .overdue(start_of_day(Utc::now()))
            .await
    }

    /// Active loans falling due between today and the next `days` days
    pub async fn upcoming(&self, query: &UpcomingQuery) -> AppResult<Vec<LoanDetails>> {
        let now = Utc::now();
        let days = query
            .days
            .unwrap_or(DEFAULT_UPCOMING_DAYS)
            .clamp(0, MAX_UPCOMING_DAYS);
        let limit = query
            .limit
            .unwrap_or(DEFAULT_UPCOMING_LIMIT)
            .clamp(1, MAX_LIMIT);

        self.repository
            .loans
            .upcoming(start_of_day(now), now + Duration::days(days), limit)
            .await
    }

    pub async fn top_books(&self, query: &TopQuery) -> AppResult<Vec<PopularityEntry>> {
        self.repository.loans.top_books(top_limit(query, DEFAULT_TOP_LIMIT)).await
    }

    pub async fn top_authors(&self, query: &TopQuery) -> AppResult<Vec<PopularityEntry>> {
        self.repository.loans.top_authors(top_limit(query, DEFAULT_TOP_LIMIT)).await
    }

    pub async fn top_categories(&self, query: &TopQuery) -> AppResult<Vec<PopularityEntry>> {
        self.repository
            .loans
            .top_categories(top_limit(query, DEFAULT_TOP_LIMIT))
            .await
    }

    pub async fn top_clients(&self, query: &TopQuery) -> AppResult<Vec<PopularityEntry>> {
        self.repository.loans.top_clients(top_limit(query, DEFAULT_TOP_LIMIT)).await
    }

    pub async fn top_books_by_author(
        &self,
        author_id: i64,
        query: &TopQuery,
    ) -> AppResult<Vec<PopularityEntry>> {
        self.repository.authors.get_by_id(author_id).await?;
        self.repository
            .loans
            .top_books_by_author(author_id, top_limit(query, DEFAULT_TOP_BOOKS_LIMIT))
            .await
    }

    pub async fn top_books_by_category(
        &self,
        category_id: i64,
        query: &TopQuery,
    ) -> AppResult<Vec<PopularityEntry>> {
        self.repository.categories.get_by_id(category_id).await?;
        self.repository
            .loans
            .top_books_by_category(category_id, top_limit(query, DEFAULT_TOP_BOOKS_LIMIT))
            .await
    }
}

fn top_limit(query: &TopQuery, default: i64) -> i64 {
    query.limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::DatabaseConfig,
        models::{enums::BookCondition, loan::LoanStatus, setting::Settings},
        repository,
        services::audit::{MockAuditLog, SqliteAuditLog},
        test_support::{memory_repository, seed_book, seed_client},
    };

    fn service(repository: &Repository) -> LoansService {
        let audit = AuditService::new(
            Arc::new(SqliteAuditLog::new(repository.audit.clone())),
            repository.audit.clone(),
        );
        LoansService::new(repository.clone(), audit)
    }

    fn checkout(client_id: i64, book_id: i64) -> CreateLoan {
        CreateLoan {
            client_id,
            book_id,
            condition_on_loan: BookCondition::Good,
            notes: None,
        }
    }

    fn give_back(condition: BookCondition) -> ReturnLoan {
        ReturnLoan {
            condition_on_return: condition,
            notes: None,
        }
    }

    async fn available(repository: &Repository, book_id: i64) -> i64 {
        repository
            .books
            .get_by_id(book_id)
            .await
            .unwrap()
            .available_quantity
    }

    fn assert_business_rule<T: std::fmt::Debug>(result: AppResult<T>, expected: ErrorCode) {
        match result {
            Err(AppError::BusinessRule(code, _)) => assert_eq!(code, expected),
            other => panic!("expected business rule {:?}, got {:?}", expected, other),
        }
    }

    #[tokio::test]
    async fn test_single_copy_scenario() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Dom Casmurro", 1).await;
        let first = seed_client(&repository, "Ana", "52998224725").await;
        let second = seed_client(&repository, "Bruno", "11144477735").await;

        let loan = loans.create_loan(1, checkout(first.id, book.id)).await.unwrap();
        assert!(loan.is_active());
        assert_eq!(loan.due_date - loan.loan_date, Duration::days(14));
        assert_eq!(available(&repository, book.id).await, 0);

        let result = loans.create_loan(1, checkout(second.id, book.id)).await;
        match result {
            Err(AppError::BusinessRule(ErrorCode::BookNotAvailable, message)) => {
                assert_eq!(message, "Book is not available")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(available(&repository, book.id).await, 0);
        assert!(loans.client_loans(second.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_return_restores_availability() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Quincas Borba", 3).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let loan = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        assert_eq!(available(&repository, book.id).await, 2);

        let returned = loans
            .return_loan(1, loan.id, give_back(BookCondition::Fair))
            .await
            .unwrap();
        assert!(returned.return_date.is_some());
        assert_eq!(returned.condition_on_return, Some(BookCondition::Fair));
        assert_eq!(available(&repository, book.id).await, 3);
    }

    #[tokio::test]
    async fn test_second_return_is_rejected_and_changes_nothing() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Helena", 2).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let loan = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        let returned = loans
            .return_loan(1, loan.id, give_back(BookCondition::Good))
            .await
            .unwrap();

        let again = loans
            .return_loan(1, loan.id, give_back(BookCondition::Damaged))
            .await;
        assert_business_rule(again, ErrorCode::AlreadyReturned);

        let stored = repository.loans.get_by_id(loan.id).await.unwrap();
        assert_eq!(stored, returned);
        assert_eq!(available(&repository, book.id).await, 2);
    }

    #[tokio::test]
    async fn test_return_unknown_loan() {
        let repository = memory_repository().await;
        let loans = service(&repository);

        let result = loans.return_loan(1, 999, give_back(BookCondition::Good)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_return_keeps_existing_notes_unless_replaced() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Iaiá Garcia", 2).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let mut request = checkout(client.id, book.id);
        request.notes = Some("capa riscada".to_string());
        let loan = loans.create_loan(1, request).await.unwrap();

        let returned = loans
            .return_loan(1, loan.id, give_back(BookCondition::Good))
            .await
            .unwrap();
        assert_eq!(returned.notes.as_deref(), Some("capa riscada"));
    }

    #[tokio::test]
    async fn test_max_loans_per_client() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        repository
            .settings
            .save(&Settings {
                max_loans_per_client: 2,
                ..Settings::default()
            })
            .await
            .unwrap();
        let book = seed_book(&repository, "Esaú e Jacó", 5).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();

        let result = loans.create_loan(1, checkout(client.id, book.id)).await;
        match result {
            Err(AppError::BusinessRule(ErrorCode::MaxLoansReached, message)) => {
                assert_eq!(message, "Client has reached the maximum loan limit (2)")
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(available(&repository, book.id).await, 3);
    }

    #[tokio::test]
    async fn test_precondition_order() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Ressurreição", 1).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let unknown_client = loans.create_loan(1, checkout(999, book.id)).await;
        assert!(matches!(unknown_client, Err(AppError::NotFound(m)) if m == "Client not found"));
        assert_eq!(available(&repository, book.id).await, 1);

        let unknown_book = loans.create_loan(1, checkout(client.id, 999)).await;
        assert!(matches!(unknown_book, Err(AppError::NotFound(m)) if m == "Book not found"));

        repository.books.deactivate(book.id).await.unwrap();
        let inactive_book = loans.create_loan(1, checkout(client.id, book.id)).await;
        assert!(matches!(inactive_book, Err(AppError::NotFound(m)) if m == "Book not found"));
    }

    #[tokio::test]
    async fn test_loan_duration_follows_settings() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        repository
            .settings
            .save(&Settings {
                loan_duration_days: 7,
                ..Settings::default()
            })
            .await
            .unwrap();
        let book = seed_book(&repository, "Memorial de Aires", 1).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let loan = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        assert_eq!(loan.due_date - loan.loan_date, Duration::days(7));
    }

    #[tokio::test]
    async fn test_out_of_range_duration_is_rejected() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        repository
            .settings
            .save(&Settings {
                loan_duration_days: 100_000_000,
                ..Settings::default()
            })
            .await
            .unwrap();
        let book = seed_book(&repository, "Esaú e Jacó", 1).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let result = loans.create_loan(1, checkout(client.id, book.id)).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(available(&repository, book.id).await, 1);
        assert!(loans.client_loans(client.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_settings_row_uses_defaults() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        sqlx::query("DELETE FROM settings")
            .execute(&repository.pool)
            .await
            .unwrap();
        let book = seed_book(&repository, "A Mão e a Luva", 1).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let loan = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        assert_eq!(loan.due_date - loan.loan_date, Duration::days(14));
    }

    #[tokio::test]
    async fn test_overdue_and_upcoming_windows() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Dom Casmurro", 2).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let late = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        let on_time = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        sqlx::query("UPDATE loans SET due_date = ? WHERE id = ?")
            .bind(Utc::now() - Duration::days(1))
            .bind(late.id)
            .execute(&repository.pool)
            .await
            .unwrap();

        let overdue: Vec<i64> = loans.overdue().await.unwrap().iter().map(|l| l.loan.id).collect();
        assert_eq!(overdue, vec![late.id]);

        let upcoming = loans.upcoming(&UpcomingQuery::default()).await.unwrap();
        let upcoming: Vec<i64> = upcoming.iter().map(|l| l.loan.id).collect();
        assert_eq!(upcoming, vec![on_time.id]);

        let filtered = loans
            .list_loans(&LoanQuery {
                status: Some(LoanStatus::Overdue),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(filtered.1, 1);
        assert_eq!(filtered.0[0].client_name.as_deref(), Some("Ana"));

        loans
            .return_loan(1, late.id, give_back(BookCondition::Good))
            .await
            .unwrap();
        assert!(loans.overdue().await.unwrap().is_empty());
        let upcoming = loans.upcoming(&UpcomingQuery::default()).await.unwrap();
        assert!(upcoming.iter().all(|l| l.loan.id != late.id));
    }

    #[tokio::test]
    async fn test_upcoming_window_is_capped() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Dom Casmurro", 1).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;
        let loan = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();

        let upcoming = loans
            .upcoming(&UpcomingQuery {
                days: Some(100_000_000),
                limit: None,
            })
            .await
            .unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].loan.id, loan.id);
    }

    #[tokio::test]
    async fn test_release_is_clamped_to_total() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Contos Fluminenses", 2).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let loan = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        // Copies were recounted by hand while the loan was out
        sqlx::query("UPDATE books SET available_quantity = total_quantity WHERE id = ?")
            .bind(book.id)
            .execute(&repository.pool)
            .await
            .unwrap();

        loans
            .return_loan(1, loan.id, give_back(BookCondition::Good))
            .await
            .unwrap();
        assert_eq!(available(&repository, book.id).await, 2);
    }

    #[tokio::test]
    async fn test_rankings_count_loans() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let popular = seed_book(&repository, "Dom Casmurro", 3).await;
        let quiet = seed_book(&repository, "Helena", 3).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        loans.create_loan(1, checkout(client.id, popular.id)).await.unwrap();
        loans.create_loan(1, checkout(client.id, popular.id)).await.unwrap();
        loans.create_loan(1, checkout(client.id, quiet.id)).await.unwrap();

        let top = loans.top_books(&TopQuery::default()).await.unwrap();
        assert_eq!(top[0].id, popular.id);
        assert_eq!(top[0].name, "Dom Casmurro");
        assert_eq!(top[0].loan_count, 2);

        let authors = loans.top_authors(&TopQuery::default()).await.unwrap();
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].loan_count, 3);

        let by_author = loans
            .top_books_by_author(popular.author_id, &TopQuery { limit: Some(1) })
            .await
            .unwrap();
        assert_eq!(by_author.len(), 1);

        let clients = loans.top_clients(&TopQuery::default()).await.unwrap();
        assert_eq!(clients[0].name, "Ana");
    }

    #[tokio::test]
    async fn test_audit_entries_written() {
        let repository = memory_repository().await;
        let loans = service(&repository);
        let book = seed_book(&repository, "Dom Casmurro", 1).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let loan = loans.create_loan(4, checkout(client.id, book.id)).await.unwrap();
        loans
            .return_loan(4, loan.id, give_back(BookCondition::Good))
            .await
            .unwrap();

        let actions: Vec<String> = repository
            .audit
            .recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(
            actions,
            vec![format!("RETURN_LOAN:{}", loan.id), format!("CREATE_LOAN:{}", loan.id)]
        );
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_fail_the_loan() {
        let repository = memory_repository().await;
        let mut log = MockAuditLog::new();
        log.expect_append()
            .returning(|_, _| Err(AppError::Internal("audit sink down".to_string())));
        let loans = LoansService::new(
            repository.clone(),
            AuditService::new(Arc::new(log), repository.audit.clone()),
        );
        let book = seed_book(&repository, "Dom Casmurro", 1).await;
        let client = seed_client(&repository, "Ana", "52998224725").await;

        let loan = loans.create_loan(1, checkout(client.id, book.id)).await.unwrap();
        loans
            .return_loan(1, loan.id, give_back(BookCondition::Good))
            .await
            .unwrap();
        assert_eq!(available(&repository, book.id).await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_of_last_copy() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("loans.db").display()),
            max_connections: 8,
            ..Default::default()
        };
        let pool = repository::connect(&config).await.unwrap();
        repository::migrate(&pool).await.unwrap();
        let repository = Repository::new(pool);
        let loans = service(&repository);

        let book = seed_book(&repository, "Dom Casmurro", 1).await;
        let cpfs = ["52998224725", "11144477735", "39053344705", "12345678909"];
        let mut clients = Vec::new();
        for (i, cpf) in cpfs.iter().enumerate() {
            clients.push(seed_client(&repository, &format!("Client {}", i), cpf).await);
        }

        let handles: Vec<_> = clients
            .iter()
            .map(|client| {
                let loans = loans.clone();
                let request = checkout(client.id, book.id);
                tokio::spawn(async move { loans.create_loan(1, request).await })
            })
            .collect();

        let mut succeeded = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(e) => assert_business_rule::<()>(Err(e), ErrorCode::BookNotAvailable),
            }
        }

        assert_eq!(succeeded, 1);
        assert_eq!(available(&repository, book.id).await, 0);
    }
}
