//! Book (catalog) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        book::{BookDetails, BookQuery, CreateBook, UpdateBook},
        loan::LoanDetails,
        page_of, per_page_of,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Search books with filters
#[utoipa::path(
    get,
    path = "/books",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "List of books", body = PaginatedResponse<BookDetails>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<PaginatedResponse<BookDetails>>> {
    let (books, total) = state.services.catalog.search_books(&query).await?;

    Ok(Json(PaginatedResponse {
        items: books,
        total,
        page: page_of(query.page),
        per_page: per_page_of(query.per_page),
    }))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<BookDetails>> {
    Ok(Json(state.services.catalog.get_book(id).await?))
}

/// Loan history of a book
#[utoipa::path(
    get,
    path = "/books/{id}/history",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Every loan of the book, newest first", body = Vec<LoanDetails>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book_history(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    Ok(Json(state.services.catalog.book_history(id).await?))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = BookDetails),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Author or category not found"),
        (status = 409, description = "Barcode, inventory number or ISBN already used")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<BookDetails>)> {
    book.validate()?;

    let created = state.services.catalog.create_book(claims.user_id, book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book; changing `total_quantity` recomputes availability
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = BookDetails),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Barcode, inventory number or ISBN already used")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(update): Json<UpdateBook>,
) -> AppResult<Json<BookDetails>> {
    update.validate()?;

    let book = state
        .services
        .catalog
        .update_book(claims.user_id, id, update)
        .await?;
    Ok(Json(book))
}

/// Delete (deactivate) a book
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Administrator required"),
        (status = 404, description = "Book not found"),
        (status = 422, description = "Book has active loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.catalog.delete_book(claims.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
