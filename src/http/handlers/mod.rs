//! HTTP handlers, one module per resource group.

pub mod auth;
pub mod blocked_dates;
pub mod bookings;
pub mod customers;
pub mod rooms;

use axum::Json;
use ulid::Ulid;

use super::dto::HealthResponse;
use super::error::AppError;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

/// Path ids that do not parse name nothing, so they are simply not found.
pub(crate) fn parse_id(raw: &str, what: &'static str) -> Result<Ulid, AppError> {
    Ulid::from_string(raw).map_err(|_| AppError::NotFound(what))
}

/// GET /api/health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn not_found() -> AppError {
    AppError::NotFound("route")
}
