//! Settings endpoints

use axum::{extract::State, Json};
use validator::Validate;

use crate::{
    error::AppResult,
    models::setting::{Settings, UpdateSettings},
    AppState,
};

use super::AuthenticatedUser;

/// Get library settings
#[utoipa::path(
    get,
    path = "/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current settings", body = Settings)
    )
)]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Settings>> {
    Ok(Json(state.services.settings.get_settings().await?))
}

/// Update library settings
#[utoipa::path(
    put,
    path = "/settings",
    tag = "settings",
    security(("bearer_auth" = [])),
    request_body = UpdateSettings,
    responses(
        (status = 200, description = "Settings updated", body = Settings),
        (status = 400, description = "Invalid value")
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(update): Json<UpdateSettings>,
) -> AppResult<Json<Settings>> {
    update.validate()?;

    let settings = state
        .services
        .settings
        .update_settings(claims.user_id, update)
        .await?;
    Ok(Json(settings))
}
