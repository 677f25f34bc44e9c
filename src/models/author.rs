//! Author model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Author model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

/// Create or rename an author
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AuthorRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
}
