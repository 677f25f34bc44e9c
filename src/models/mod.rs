//! Data models for Biblioteca

pub mod audit;
pub mod author;
pub mod book;
pub mod category;
pub mod client;
pub mod enums;
pub mod loan;
pub mod setting;
pub mod user;
pub mod validation;

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookDetails};
pub use category::Category;
pub use client::Client;
pub use enums::{AcquisitionType, BookCondition, CoverType, Role};
pub use loan::{Loan, LoanDetails};
pub use setting::{LoanPolicy, Settings};
pub use user::{User, UserClaims};

const DEFAULT_PER_PAGE: i64 = 20;
const MAX_PER_PAGE: i64 = 200;

/// Free-text search with pagination, shared by the simple catalog lists
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl SearchQuery {
    pub fn page(&self) -> i64 {
        page_of(self.page)
    }

    pub fn per_page(&self) -> i64 {
        per_page_of(self.per_page)
    }
}

pub(crate) fn page_of(page: Option<i64>) -> i64 {
    page.unwrap_or(1).max(1)
}

pub(crate) fn per_page_of(per_page: Option<i64>) -> i64 {
    per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
}

/// `LIKE` pattern for a substring search, `None` when the term is blank
pub(crate) fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t))
}
