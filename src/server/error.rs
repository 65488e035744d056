use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Rejected input (wrong content type, missing field, undecodable image).
    InvalidInput(String),
    /// Upload exceeds the configured body limit.
    TooLarge(String),
    /// Anything that went wrong while processing valid input.
    Processing(String),
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            AppError::TooLarge(msg) => write!(f, "upload too large: {msg}"),
            AppError::Processing(msg) => write!(f, "processing failed: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Processing(format!("worker task failed: {e}"))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::InvalidInput(msg) => {
                tracing::info!("Rejected request: {msg}");
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::TooLarge(msg) => {
                tracing::info!("Rejected oversized upload: {msg}");
                (StatusCode::PAYLOAD_TOO_LARGE, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Processing(msg) => {
                tracing::error!("❌ Processing error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "detail": msg }))).into_response()
            }
        }
    }
}
