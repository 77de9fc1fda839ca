// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::llm::LlmError;

/// Global Application Error Enum.
/// Every handler failure collapses into one of these and is rendered as
/// `{"error": ..., "details"?: ...}`.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 500, but the AI service is to blame; the reason is relayed to the caller
    Upstream(String),

    // 400 Bad Request
    BadRequest(String),

    // 400 Bad Request with field-level details
    Validation(validator::ValidationErrors),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (signed in, but not on the admin allow-list)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, details) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::Upstream(msg) => {
                tracing::error!("AI service error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AI request failed".to_string(),
                    Some(msg),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Invalid request body".to_string(),
                Some(errors.to_string()),
            ),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
        };

        let body = match details {
            Some(details) => Json(json!({ "error": error_message, "details": details })),
            None => Json(json!({ "error": error_message })),
        };

        (status, body).into_response()
    }
}

/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::UnknownEngine(name) => {
                AppError::BadRequest(format!("Unknown AI engine '{}'", name))
            }
            other => AppError::Upstream(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_engine_is_a_client_error() {
        let err = AppError::from(LlmError::UnknownEngine("claude".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_failures_are_server_errors() {
        let err = AppError::from(LlmError::EmptyResponse);
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let err = AppError::Forbidden("Admin access required".to_string());
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }
}
