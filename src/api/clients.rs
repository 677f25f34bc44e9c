//! Client (borrower) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        client::{Client, CreateClient, UpdateClient},
        SearchQuery,
    },
    AppState,
};

use super::{AuthenticatedUser, PaginatedResponse};

/// List clients, searching by name or CPF
#[utoipa::path(
    get,
    path = "/clients",
    tag = "clients",
    security(("bearer_auth" = [])),
    params(SearchQuery),
    responses(
        (status = 200, description = "List of clients", body = PaginatedResponse<Client>),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_clients(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<PaginatedResponse<Client>>> {
    let (clients, total) = state.services.clients.search(&query).await?;

    Ok(Json(PaginatedResponse {
        items: clients,
        total,
        page: query.page(),
        per_page: query.per_page(),
    }))
}

/// Get client by ID
#[utoipa::path(
    get,
    path = "/clients/{id}",
    tag = "clients",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Client ID")
    ),
    responses(
        (status = 200, description = "Client details", body = Client),
        (status = 404, description = "Client not found")
    )
)]
pub async fn get_client(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Client>> {
    let client = state.services.clients.get(id).await?;
    Ok(Json(client))
}

/// Register a client
#[utoipa::path(
    post,
    path = "/clients",
    tag = "clients",
    security(("bearer_auth" = [])),
    request_body = CreateClient,
    responses(
        (status = 201, description = "Client created", body = Client),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "CPF or phone already registered")
    )
)]
pub async fn create_client(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(client): Json<CreateClient>,
) -> AppResult<(StatusCode, Json<Client>)> {
    client.validate()?;

    let created = state.services.clients.create(claims.user_id, client).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a client
#[utoipa::path(
    put,
    path = "/clients/{id}",
    tag = "clients",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Client ID")
    ),
    request_body = UpdateClient,
    responses(
        (status = 200, description = "Client updated", body = Client),
        (status = 404, description = "Client not found"),
        (status = 409, description = "Phone already registered")
    )
)]
pub async fn update_client(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
    Json(update): Json<UpdateClient>,
) -> AppResult<Json<Client>> {
    update.validate()?;

    let client = state.services.clients.update(claims.user_id, id, update).await?;
    Ok(Json(client))
}

/// Delete (deactivate) a client
#[utoipa::path(
    delete,
    path = "/clients/{id}",
    tag = "clients",
    security(("bearer_auth" = [])),
    params(
        ("id" = i64, Path, description = "Client ID")
    ),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 404, description = "Client not found"),
        (status = 422, description = "Client has active loans", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_client(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    state.services.clients.delete(claims.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
