//! Category endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        category::{Category, CategoryRequest},
        SearchQuery,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List active categories
#[utoipa::path(
    get,
    path = "/categories",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "List of categories", body = PaginatedResponse<Category>)
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<PaginatedResponse<Category>>> {
    let (categories, total) = state.services.catalog.search_categories(&query).await?;

    Ok(Json(PaginatedResponse {
        items: categories,
        total,
        page: query.page(),
        per_page: query.per_page(),
    }))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category", body = Category),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Category>> {
    Ok(Json(state.services.catalog.get_category(id).await?))
}

/// Create a category (reactivates a deleted one with the same name)
#[utoipa::path(
    post,
    path = "/categories",
    tag = "catalog",
    security(("bearer_auth" = [])),
    request_body = CategoryRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 409, description = "Category already exists")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    request.validate()?;

    let category = state
        .services
        .catalog
        .create_category(claims.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    request_body = CategoryRequest,
    responses(
        (status = 200, description = "Category renamed", body = Category),
        (status = 404, description = "Category not found"),
        (status = 409, description = "Name already used")
    )
)]
pub async fn update_category(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(request): Json<CategoryRequest>,
) -> AppResult<Json<Category>> {
    request.validate()?;

    let category = state
        .services
        .catalog
        .update_category(claims.user_id, id, request)
        .await?;
    Ok(Json(category))
}

#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "catalog",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Category ID")
    ),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 404, description = "Category not found"),
        (status = 422, description = "Category still has active books", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_category(claims.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
