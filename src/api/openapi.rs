//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    auth, authors, books, categories, clients, health, loans, logs, settings, users,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Biblioteca API",
        version = "1.0.0",
        description = "Library lending REST API: catalog, clients, loans and settings"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::me,
        // Users
        users::get_my_profile,
        users::update_my_profile,
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::delete_user,
        users::activate_user,
        users::deactivate_user,
        // Clients
        clients::list_clients,
        clients::get_client,
        clients::create_client,
        clients::update_client,
        clients::delete_client,
        // Catalog
        authors::list_authors,
        authors::get_author,
        authors::create_author,
        authors::update_author,
        authors::delete_author,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        books::list_books,
        books::get_book,
        books::get_book_history,
        books::create_book,
        books::update_book,
        books::delete_book,
        // Loans
        loans::list_loans,
        loans::get_loan,
        loans::get_client_loans,
        loans::create_loan,
        loans::return_loan,
        loans::overdue_loans,
        loans::upcoming_loans,
        loans::top_books,
        loans::top_authors,
        loans::top_categories,
        loans::top_clients,
        loans::top_books_by_author,
        loans::top_books_by_category,
        // Settings
        settings::get_settings,
        settings::update_settings,
        // Audit
        logs::list_logs,
    ),
    components(
        schemas(
            // Auth
            auth::LoginRequest,
            auth::LoginResponse,
            // Users
            crate::models::user::User,
            crate::models::user::CreateUser,
            crate::models::user::UpdateUser,
            crate::models::user::UpdateProfile,
            crate::models::enums::Role,
            // Clients
            crate::models::client::Client,
            crate::models::client::CreateClient,
            crate::models::client::UpdateClient,
            // Catalog
            crate::models::author::Author,
            crate::models::author::AuthorRequest,
            crate::models::category::Category,
            crate::models::category::CategoryRequest,
            crate::models::book::Book,
            crate::models::book::BookDetails,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            crate::models::enums::AcquisitionType,
            crate::models::enums::CoverType,
            // Loans
            crate::models::loan::Loan,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanStatus,
            crate::models::loan::CreateLoan,
            crate::models::loan::ReturnLoan,
            crate::models::loan::PopularityEntry,
            crate::models::enums::BookCondition,
            // Settings
            crate::models::setting::Settings,
            crate::models::setting::UpdateSettings,
            // Audit
            crate::models::audit::LogEntry,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "Staff user management"),
        (name = "clients", description = "Borrower management"),
        (name = "catalog", description = "Authors, categories and books"),
        (name = "loans", description = "Loan lifecycle and reports"),
        (name = "settings", description = "Library settings"),
        (name = "logs", description = "Audit trail")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
