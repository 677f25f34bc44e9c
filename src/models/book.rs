//! Book model and related types
//!
//! A book row doubles as the inventory ledger for its copies:
//! `0 <= available_quantity <= total_quantity` at all times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{AcquisitionType, CoverType};

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    pub category_id: i64,
    pub photo: Option<String>,
    pub origin: Option<String>,
    pub acquisition_type: AcquisitionType,
    /// Copies owned by the library
    pub total_quantity: i64,
    /// Copies not currently on loan
    pub available_quantity: i64,
    pub barcode: Option<String>,
    pub inventory_number: Option<String>,
    pub edition: Option<String>,
    pub cover_type: Option<CoverType>,
    pub isbn: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Book with its author and category names resolved
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub book: Book,
    pub author_name: Option<String>,
    pub category_name: Option<String>,
}

/// Book list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Matches title, barcode, inventory number or ISBN
    pub search: Option<String>,
    pub author_id: Option<i64>,
    pub author_name: Option<String>,
    pub category_id: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub author_id: i64,
    pub category_id: i64,
    pub photo: Option<String>,
    pub origin: Option<String>,
    pub acquisition_type: AcquisitionType,
    #[validate(range(min = 1, message = "Total quantity must be positive"))]
    pub total_quantity: i64,
    pub barcode: Option<String>,
    pub inventory_number: Option<String>,
    pub edition: Option<String>,
    pub cover_type: Option<CoverType>,
    pub isbn: Option<String>,
}

/// Update book request; absent fields are left unchanged and an empty
/// string clears an optional text field
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title cannot be empty"))]
    pub title: Option<String>,
    pub author_id: Option<i64>,
    pub category_id: Option<i64>,
    pub photo: Option<String>,
    pub origin: Option<String>,
    pub acquisition_type: Option<AcquisitionType>,
    #[validate(range(min = 1, message = "Total quantity must be positive"))]
    pub total_quantity: Option<i64>,
    pub barcode: Option<String>,
    pub inventory_number: Option<String>,
    pub edition: Option<String>,
    pub cover_type: Option<CoverType>,
    pub isbn: Option<String>,
}

/// Blank optional text becomes NULL
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Book {
    /// Apply an update on top of the stored row; quantities are handled
    /// separately by the inventory ledger
    pub fn merge(mut self, update: UpdateBook) -> Self {
        if let Some(title) = update.title {
            self.title = title;
        }
        if let Some(author_id) = update.author_id {
            self.author_id = author_id;
        }
        if let Some(category_id) = update.category_id {
            self.category_id = category_id;
        }
        if let Some(acquisition_type) = update.acquisition_type {
            self.acquisition_type = acquisition_type;
        }
        if let Some(cover_type) = update.cover_type {
            self.cover_type = Some(cover_type);
        }
        if update.photo.is_some() {
            self.photo = non_blank(update.photo);
        }
        if update.origin.is_some() {
            self.origin = non_blank(update.origin);
        }
        if update.barcode.is_some() {
            self.barcode = non_blank(update.barcode);
        }
        if update.inventory_number.is_some() {
            self.inventory_number = non_blank(update.inventory_number);
        }
        if update.edition.is_some() {
            self.edition = non_blank(update.edition);
        }
        if update.isbn.is_some() {
            self.isbn = non_blank(update.isbn);
        }
        self
    }
}
