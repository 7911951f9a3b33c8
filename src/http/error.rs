//! HTTP error handling and response types.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::access::AdminRequired;
use crate::auth::AuthError;
use crate::engine::EngineError;

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-stable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Per-field validation messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Application error type for HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Request body failed field validation
    Validation(validator::ValidationErrors),
    /// Malformed request
    BadRequest(String),
    /// Missing or bad credentials or token
    Unauthorized(&'static str),
    /// Authenticated, but not an administrator
    Forbidden,
    /// Unknown route or unparseable id
    NotFound(&'static str),
    Engine(EngineError),
    /// Logged, never shown to the client
    Internal(String),
}

/// `{ field: [message, ...] }` for the response body.
fn field_details(errors: &validator::ValidationErrors) -> serde_json::Value {
    let fields: BTreeMap<String, Vec<String>> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string())
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect();
    serde_json::json!(fields)
}

fn internal(detail: &str) -> (StatusCode, ApiError) {
    tracing::error!(error = %detail, "request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ApiError::new("INTERNAL_ERROR", "internal error"),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                ApiError::new("VALIDATION_ERROR", "request validation failed")
                    .with_details(field_details(&errors)),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg)),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, ApiError::new("UNAUTHORIZED", msg)),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                ApiError::new("FORBIDDEN", AdminRequired.to_string()),
            ),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", format!("{what} not found"))),
            AppError::Engine(e) => match e {
                EngineError::NotFound(_) => (StatusCode::NOT_FOUND, ApiError::new("NOT_FOUND", e.to_string())),
                EngineError::Conflict(_) => (
                    StatusCode::CONFLICT,
                    ApiError::new("CONFLICT", "room is not available for the selected dates"),
                ),
                EngineError::EmailTaken => (StatusCode::BAD_REQUEST, ApiError::new("EMAIL_TAKEN", e.to_string())),
                EngineError::InvalidResetToken => (
                    StatusCode::BAD_REQUEST,
                    ApiError::new("INVALID_RESET_TOKEN", e.to_string()),
                ),
                EngineError::ExpiredResetToken => (
                    StatusCode::BAD_REQUEST,
                    ApiError::new("EXPIRED_RESET_TOKEN", e.to_string()),
                ),
                EngineError::Terminal => (StatusCode::CONFLICT, ApiError::new("TERMINAL_STATUS", e.to_string())),
                EngineError::InUse(_) => (StatusCode::CONFLICT, ApiError::new("IN_USE", e.to_string())),
                EngineError::Invalid(msg) => (StatusCode::BAD_REQUEST, ApiError::new("BAD_REQUEST", msg)),
                EngineError::LimitExceeded(msg) => (StatusCode::BAD_REQUEST, ApiError::new("LIMIT_EXCEEDED", msg)),
                EngineError::WalError(ref detail) => internal(detail),
            },
            AppError::Internal(detail) => internal(&detail),
        };

        (status, Json(error)).into_response()
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        AppError::Engine(err)
    }
}

impl From<AdminRequired> for AppError {
    fn from(_: AdminRequired) -> Self {
        AppError::Forbidden
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidToken => AppError::Unauthorized("invalid or expired token"),
            AuthError::Hashing(detail) => AppError::Internal(detail),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::Internal(err.to_string())
    }
}
