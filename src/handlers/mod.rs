//! # API Handlers
//!
//! HTTP endpoint handlers: report upload, statistics reads and probes.

use crate::db;
use crate::error::{ApiError, ErrorType};
use crate::models::ServiceInfo;
use crate::server::AppState;
use axum::{extract::State, response::Json};

pub mod stats;
pub mod submissions;

/// Liveness probe returning basic service information
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is running", body = ServiceInfo)
    ),
    tag = "health"
)]
pub async fn health() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

/// Readiness probe; fails while the database is unreachable
#[utoipa::path(
    get,
    path = "/readyz",
    responses(
        (status = 200, description = "Database reachable", body = ServiceInfo),
        (status = 503, description = "Database unreachable", body = ApiError)
    ),
    tag = "health"
)]
pub async fn ready(State(state): State<AppState>) -> Result<Json<ServiceInfo>, ApiError> {
    db::health_check(&state.db).await.map_err(|err| {
        tracing::warn!(error = %err, "Readiness check failed");
        ApiError::typed(ErrorType::ServiceUnavailable, "Database unavailable")
    })?;
    Ok(Json(ServiceInfo::default()))
}

#[cfg(test)]
mod tests;
