//! Repository layer for database operations
//!
//! Most methods run against the shared pool. The inventory and loan
//! mutations that must be atomic are associated functions taking a
//! `&mut SqliteConnection`, so services can compose them inside one
//! transaction.

pub mod audit;
pub mod authors;
pub mod books;
pub mod categories;
pub mod clients;
pub mod loans;
pub mod settings;
pub mod users;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

use crate::{config::DatabaseConfig, error::AppResult};

/// Main repository struct holding database connection pool
#[derive(Clone)]
pub struct Repository {
    pub pool: SqlitePool,
    pub audit: audit::AuditRepository,
    pub authors: authors::AuthorsRepository,
    pub books: books::BooksRepository,
    pub categories: categories::CategoriesRepository,
    pub clients: clients::ClientsRepository,
    pub loans: loans::LoansRepository,
    pub settings: settings::SettingsRepository,
    pub users: users::UsersRepository,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            audit: audit::AuditRepository::new(pool.clone()),
            authors: authors::AuthorsRepository::new(pool.clone()),
            books: books::BooksRepository::new(pool.clone()),
            categories: categories::CategoriesRepository::new(pool.clone()),
            clients: clients::ClientsRepository::new(pool.clone()),
            loans: loans::LoansRepository::new(pool.clone()),
            settings: settings::SettingsRepository::new(pool.clone()),
            users: users::UsersRepository::new(pool.clone()),
            pool,
        }
    }
}

/// Open the SQLite pool described by the configuration
pub async fn connect(config: &DatabaseConfig) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

    // Every connection to `:memory:` is its own database: keep exactly one alive
    let pool = if config.url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_with(options)
            .await?
    };

    Ok(pool)
}

/// Apply the embedded schema migrations
pub async fn migrate(pool: &SqlitePool) -> AppResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Convert an (optional) page request into `(limit, offset)`
pub(crate) fn limit_offset(page: i64, per_page: i64) -> (i64, i64) {
    (per_page, (page - 1) * per_page)
}
