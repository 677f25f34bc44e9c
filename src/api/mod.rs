//! API handlers for Biblioteca REST endpoints

pub mod auth;
pub mod authors;
pub mod books;
pub mod categories;
pub mod clients;
pub mod health;
pub mod loans;
pub mod logs;
pub mod openapi;
pub mod settings;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::ToSchema;

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

        let claims = UserClaims::from_token(token, &state.config.auth.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;

        Ok(AuthenticatedUser(claims))
    }
}

/// Paginated response wrapper
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T>
where
    T: for<'a> ToSchema<'a>,
{
    /// Items of the requested page
    pub items: Vec<T>,
    /// Total number of matching items
    pub total: i64,
    /// Current page number
    pub page: i64,
    /// Items per page
    pub per_page: i64,
}

/// Build the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        // Users
        .route("/users/me", get(users::get_my_profile).put(users::update_my_profile))
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route("/users/:id/activate", post(users::activate_user))
        .route("/users/:id/deactivate", post(users::deactivate_user))
        // Clients
        .route("/clients", get(clients::list_clients).post(clients::create_client))
        .route(
            "/clients/:id",
            get(clients::get_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        // Authors
        .route("/authors", get(authors::list_authors).post(authors::create_author))
        .route(
            "/authors/:id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        // Categories
        .route(
            "/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route(
            "/categories/:id",
            get(categories::get_category)
                .put(categories::update_category)
                .delete(categories::delete_category),
        )
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/history", get(books::get_book_history))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/overdue", get(loans::overdue_loans))
        .route("/loans/upcoming", get(loans::upcoming_loans))
        .route("/loans/top/books", get(loans::top_books))
        .route("/loans/top/authors", get(loans::top_authors))
        .route("/loans/top/categories", get(loans::top_categories))
        .route("/loans/top/clients", get(loans::top_clients))
        .route("/loans/top/books/author/:id", get(loans::top_books_by_author))
        .route("/loans/top/books/category/:id", get(loans::top_books_by_category))
        .route("/loans/client/:client_id", get(loans::get_client_loans))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        // Settings
        .route(
            "/settings",
            get(settings::get_settings).put(settings::update_settings),
        )
        // Audit trail
        .route("/logs", get(logs::list_logs))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
