//! Staff user model, JWT claims and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::Role;
use super::validation::validate_cpf;
use crate::error::AppError;

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub name: String,
    /// Login identifier, digits only
    pub cpf: String,
    pub phone: String,
    pub address: String,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Role,
    /// Hashed password (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Create user request (admin only)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(custom(function = "validate_cpf"))]
    pub cpf: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Role,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Update user request (admin only)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub phone: Option<String>,
    #[validate(length(min = 1))]
    pub address: Option<String>,
    pub photo: Option<String>,
    pub role: Option<Role>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

/// Update own profile request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 1))]
    pub name: Option<String>,
    /// Only administrators may change their CPF
    #[validate(custom(function = "validate_cpf"))]
    pub cpf: Option<String>,
    #[validate(length(min = 1))]
    pub phone: Option<String>,
    #[validate(length(min = 1))]
    pub address: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub photo: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    /// CPF of the user
    pub sub: String,
    pub user_id: i64,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }
}
