//! Audit trail endpoint

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::AppResult, models::audit::LogEntry, AppState};

use super::AuthenticatedUser;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LogQuery {
    /// Number of entries (default 100)
    pub limit: Option<i64>,
}

/// Most recent audit entries
#[utoipa::path(
    get,
    path = "/logs",
    tag = "logs",
    security(("bearer_auth" = [])),
    params(LogQuery),
    responses(
        (status = 200, description = "Audit entries, newest first", body = Vec<LogEntry>),
        (status = 403, description = "Administrator required")
    )
)]
pub async fn list_logs(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<LogQuery>,
) -> AppResult<Json<Vec<LogEntry>>> {
    claims.require_admin()?;

    let entries = state
        .services
        .audit
        .recent(query.limit.unwrap_or(100))
        .await?;
    Ok(Json(entries))
}
