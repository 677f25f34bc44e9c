//! Staff user management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        user::{CreateUser, UpdateProfile, UpdateUser, User},
        SearchQuery,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// Get own profile
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Own profile", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn get_my_profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<User>> {
    let user = state.services.users.get_by_id(claims.user_id).await?;
    Ok(Json(user))
}

/// Update own profile
#[utoipa::path(
    put,
    path = "/users/me",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid input"),
        (status = 403, description = "CPF change requires administrator")
    )
)]
pub async fn update_my_profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(profile): Json<UpdateProfile>,
) -> AppResult<Json<User>> {
    profile.validate()?;

    let user = state.services.users.update_profile(&claims, profile).await?;
    Ok(Json(user))
}

/// List users with search and pagination
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "List of users", body = PaginatedResponse<User>),
        (status = 403, description = "Administrator required")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<PaginatedResponse<User>>> {
    claims.require_admin()?;

    let (users, total) = state.services.users.list_users(&query).await?;

    Ok(Json(PaginatedResponse {
        items: users,
        total,
        page: query.page(),
        per_page: query.per_page(),
    }))
}

/// Get user details by ID
#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User details", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;

    let user = state.services.users.get_by_id(id).await?;
    Ok(Json(user))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "CPF already registered")
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(user): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    claims.require_admin()?;
    user.validate()?;

    let created = state.services.users.create_user(claims.user_id, user).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a user
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(update): Json<UpdateUser>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;
    update.validate()?;

    let user = state.services.users.update_user(claims.user_id, id, update).await?;
    Ok(Json(user))
}

/// Delete a user
#[utoipa::path(
    delete,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete own account"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.users.delete_user(claims.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Re-enable a user account
#[utoipa::path(
    post,
    path = "/users/{id}/activate",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User activated", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn activate_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;

    let user = state.services.users.set_active(claims.user_id, id, true).await?;
    Ok(Json(user))
}

/// Disable a user account
#[utoipa::path(
    post,
    path = "/users/{id}/deactivate",
    tag = "users",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User deactivated", body = User),
        (status = 400, description = "Cannot deactivate own account"),
        (status = 404, description = "User not found")
    )
)]
pub async fn deactivate_user(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    claims.require_admin()?;

    let user = state.services.users.set_active(claims.user_id, id, false).await?;
    Ok(Json(user))
}
