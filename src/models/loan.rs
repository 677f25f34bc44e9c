//! Loan model and related types
//!
//! A loan is active while `return_date` is NULL and becomes returned exactly
//! once, when the return date is set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::BookCondition;

/// Loan model from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i64,
    pub client_id: i64,
    pub book_id: i64,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub condition_on_loan: BookCondition,
    pub condition_on_return: Option<BookCondition>,
    pub notes: Option<String>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.return_date.is_none()
    }

    /// Active and due before the start of `now`'s day
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && self.due_date < start_of_day(now)
    }
}

/// Loan with client and book summary for display
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LoanDetails {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub loan: Loan,
    pub client_name: Option<String>,
    pub client_cpf: Option<String>,
    pub book_title: Option<String>,
}

/// Loan state filter for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
    Overdue,
}

impl LoanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
        }
    }
}

/// Loan list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    pub status: Option<LoanStatus>,
    /// Substring of the book title
    pub book_search: Option<String>,
    /// Substring of the client name or CPF
    pub client_search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Upcoming-due window
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct UpcomingQuery {
    /// Days ahead to look (default 30)
    pub days: Option<i64>,
    /// Maximum number of loans (default 10)
    pub limit: Option<i64>,
}

/// Ranking size for the popularity reports
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct TopQuery {
    pub limit: Option<i64>,
}

/// Checkout request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    pub client_id: i64,
    pub book_id: i64,
    pub condition_on_loan: BookCondition,
    #[validate(length(max = 2000, message = "Notes are too long"))]
    pub notes: Option<String>,
}

/// Return request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ReturnLoan {
    pub condition_on_return: BookCondition,
    #[validate(length(max = 2000, message = "Notes are too long"))]
    pub notes: Option<String>,
}

/// Loan count for one book, author, category or client
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct PopularityEntry {
    pub id: i64,
    /// Book title, or author / category / client name
    pub name: String,
    pub loan_count: i64,
}

/// Midnight UTC of the day containing `now`
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}
