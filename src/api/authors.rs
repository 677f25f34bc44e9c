//! Author endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        author::{Author, AuthorRequest},
        SearchQuery,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List active authors
#[utoipa::path(
    get,
    path = "/authors",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "List of authors", body = PaginatedResponse<Author>)
    )
)]
pub async fn list_authors(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<PaginatedResponse<Author>>> {
    let (authors, total) = state.services.catalog.search_authors(&query).await?;

    Ok(Json(PaginatedResponse {
        items: authors,
        total,
        page: query.page(),
        per_page: query.per_page(),
    }))
}

#[utoipa::path(
    get,
    path = "/authors/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Author ID")
    ),
    responses(
        (status = 200, description = "Author", body = Author),
        (status = 404, description = "Author not found")
    )
)]
pub async fn get_author(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Author>> {
    Ok(Json(state.services.catalog.get_author(id).await?))
}

/// Create an author (reactivates a deleted one with the same name)
#[utoipa::path(
    post,
    path = "/authors",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = AuthorRequest,
    responses(
        (status = 201, description = "Author created", body = Author),
        (status = 409, description = "Author already exists")
    )
)]
pub async fn create_author(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<AuthorRequest>,
) -> AppResult<(StatusCode, Json<Author>)> {
    request.validate()?;

    let author = state
        .services
        .catalog
        .create_author(claims.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(author)))
}

#[utoipa::path(
    put,
    path = "/authors/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Author ID")
    ),
    request_body = AuthorRequest,
    responses(
        (status = 200, description = "Author renamed", body = Author),
        (status = 404, description = "Author not found"),
        (status = 409, description = "Name already used")
    )
)]
pub async fn update_author(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<AuthorRequest>,
) -> AppResult<Json<Author>> {
    request.validate()?;

    let author = state
        .services
        .catalog
        .update_author(claims.user_id, id, request)
        .await?;
    Ok(Json(author))
}

#[utoipa::path(
    delete,
    path = "/authors/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Author ID")
    ),
    responses(
        (status = 204, description = "Author deleted"),
        (status = 404, description = "Author not found"),
        (status = 422, description = "Author still has active books", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_author(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_author(claims.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
