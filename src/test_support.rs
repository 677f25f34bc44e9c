//! Fixtures for unit tests: a migrated in-memory database and seed rows

use chrono::Utc;

use crate::{
    config::DatabaseConfig,
    models::{
        book::CreateBook,
        client::CreateClient,
        enums::AcquisitionType,
        Book, Client,
    },
    repository::{self, Repository},
};

pub async fn memory_repository() -> Repository {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..Default::default()
    };
    let pool = repository::connect(&config).await.unwrap();
    repository::migrate(&pool).await.unwrap();
    Repository::new(pool)
}

/// Active book with `total` copies, all on the shelf
pub async fn seed_book(repository: &Repository, title: &str, total: i64) -> Book {
    let author = match repository.authors.find_by_name("Machado de Assis").await.unwrap() {
        Some(author) => author,
        None => repository.authors.create("Machado de Assis").await.unwrap(),
    };
    let category = match repository.categories.find_by_name("Romance").await.unwrap() {
        Some(category) => category,
        None => repository.categories.create("Romance").await.unwrap(),
    };

    repository
        .books
        .create(
            CreateBook {
                title: title.to_string(),
                author_id: author.id,
                category_id: category.id,
                photo: None,
                origin: None,
                acquisition_type: AcquisitionType::Purchase,
                total_quantity: total,
                barcode: None,
                inventory_number: None,
                edition: None,
                cover_type: None,
                isbn: None,
            },
            Utc::now(),
        )
        .await
        .unwrap()
}

pub async fn seed_client(repository: &Repository, name: &str, cpf: &str) -> Client {
    repository
        .clients
        .create(
            CreateClient {
                name: name.to_string(),
                cpf: cpf.to_string(),
                phone: format!("55{}", cpf),
                address: None,
                street: None,
                number: None,
                neighborhood: None,
                city: None,
                state: None,
                zip_code: None,
                email: None,
                photo: None,
            },
            Utc::now(),
        )
        .await
        .unwrap()
}
