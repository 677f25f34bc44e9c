//! Client (borrower) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::non_blank;
use super::validation::validate_cpf;

/// Client model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Client {
    pub id: i64,
    pub name: String,
    /// Digits only
    pub cpf: String,
    pub phone: String,
    pub address: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Create client request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateClient {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(custom(function = "validate_cpf"))]
    pub cpf: String,
    #[validate(length(min = 1, message = "Phone is required"))]
    pub phone: String,
    pub address: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub photo: Option<String>,
}

/// Update client request (the CPF is immutable)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateClient {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Phone cannot be empty"))]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub neighborhood: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub photo: Option<String>,
}

impl Client {
    pub fn merge(mut self, update: UpdateClient) -> Self {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(phone) = update.phone {
            self.phone = phone;
        }
        let optional = [
            (update.address, &mut self.address),
            (update.street, &mut self.street),
            (update.number, &mut self.number),
            (update.neighborhood, &mut self.neighborhood),
            (update.city, &mut self.city),
            (update.state, &mut self.state),
            (update.zip_code, &mut self.zip_code),
            (update.email, &mut self.email),
            (update.photo, &mut self.photo),
        ];
        for (value, field) in optional {
            if value.is_some() {
                *field = non_blank(value);
            }
        }
        self
    }
}
