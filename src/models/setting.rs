//! Library settings (singleton row)

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

pub const DEFAULT_MAX_LOANS_PER_CLIENT: i64 = 5;
pub const DEFAULT_LOAN_DURATION_DAYS: i64 = 14;
/// Ten years
pub const MAX_LOAN_DURATION_DAYS: i64 = 3650;

/// The lending rules the loan lifecycle depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LoanPolicy {
    pub max_loans_per_client: i64,
    pub loan_duration_days: i64,
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            max_loans_per_client: DEFAULT_MAX_LOANS_PER_CLIENT,
            loan_duration_days: DEFAULT_LOAN_DURATION_DAYS,
        }
    }
}

/// Full settings record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Settings {
    pub max_loans_per_client: i64,
    pub loan_duration_days: i64,
    pub library_name: String,
    pub library_logo: Option<String>,
    pub sidebar_color: String,
}

impl Default for Settings {
    fn default() -> Self {
        let policy = LoanPolicy::default();
        Self {
            max_loans_per_client: policy.max_loans_per_client,
            loan_duration_days: policy.loan_duration_days,
            library_name: "Biblioteca".to_string(),
            library_logo: None,
            sidebar_color: "gray.800".to_string(),
        }
    }
}

impl Settings {
    pub fn loan_policy(&self) -> LoanPolicy {
        LoanPolicy {
            max_loans_per_client: self.max_loans_per_client,
            loan_duration_days: self.loan_duration_days,
        }
    }

    pub fn merge(mut self, update: UpdateSettings) -> Self {
        if let Some(max) = update.max_loans_per_client {
            self.max_loans_per_client = max;
        }
        if let Some(days) = update.loan_duration_days {
            self.loan_duration_days = days;
        }
        if let Some(name) = update.library_name {
            self.library_name = name;
        }
        if let Some(logo) = update.library_logo {
            self.library_logo = logo.filter(|l| !l.is_empty());
        }
        if let Some(color) = update.sidebar_color {
            self.sidebar_color = color;
        }
        self
    }
}

/// Partial settings update
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSettings {
    #[validate(range(min = 1, message = "Must be positive"))]
    pub max_loans_per_client: Option<i64>,
    #[validate(range(min = 1, max = 3650, message = "Must be between 1 and 3650"))]
    pub loan_duration_days: Option<i64>,
    #[validate(length(min = 1, message = "Library name is required"))]
    pub library_name: Option<String>,
    /// `null` or an empty string removes the logo; absent keeps it
    #[serde(default, with = "::serde_with::rust::double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub library_logo: Option<Option<String>>,
    pub sidebar_color: Option<String>,
}
