//! Error types for the chat API.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use thiserror::Error;

/// Errors returned by API handlers as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body or its fields are unusable.
    #[error("{0}")]
    BadRequest(String),

    /// No character could produce content.
    #[error("{0}")]
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!(error = %rejection.body_text(), "Rejected chat request body");
        ApiError::BadRequest("Missing required fields".to_string())
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidRequest(detail) => {
                ApiError::BadRequest(format!("Missing required fields: {}", detail))
            }
            OrchestratorError::NoCharacters => {
                ApiError::Internal("No character selected".to_string())
            }
            OrchestratorError::Gateway(err) => {
                tracing::warn!(error = %err, "Gateway error reached the chat handler");
                ApiError::Internal(err.user_message().to_string())
            }
            other => ApiError::Internal(format!("Internal server error: {}", other)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Chat error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type Result<T> = std::result::Result<T, ApiError>;
