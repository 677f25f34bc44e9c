//! Category model and related types

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Category model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

/// Create or rename a category
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CategoryRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
}
