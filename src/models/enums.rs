//! Shared domain enums
//!
//! All of them are stored as upper-case TEXT columns, guarded by `CHECK`
//! constraints in the schema.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// ---------------------------------------------------------------------------
// BookCondition
// ---------------------------------------------------------------------------

/// Physical condition of a copy when lent or returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum BookCondition {
    New,
    Good,
    Fair,
    Damaged,
}

impl BookCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookCondition::New => "NEW",
            BookCondition::Good => "GOOD",
            BookCondition::Fair => "FAIR",
            BookCondition::Damaged => "DAMAGED",
        }
    }
}

impl std::fmt::Display for BookCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AcquisitionType
// ---------------------------------------------------------------------------

/// How a book entered the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum AcquisitionType {
    Donation,
    Purchase,
}

// ---------------------------------------------------------------------------
// CoverType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum CoverType {
    Softcover,
    Hardcover,
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Staff role; ADMIN unlocks user administration and book deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}
