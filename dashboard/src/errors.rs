//! Error types for the Deckhand dashboard

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use openapi_server::models::ErrorResponse;
use thiserror::Error;
use tracing::error;

/// Main error type for the dashboard
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    TokenError(#[from] jsonwebtoken::errors::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// An external command was rejected or failed
    #[error("{0}")]
    Command(String),

    #[error("{0}")]
    Database(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DashboardError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DashboardError::Validation(_) => StatusCode::BAD_REQUEST,
            DashboardError::Unauthorized(_) | DashboardError::TokenError(_) => {
                StatusCode::UNAUTHORIZED
            }
            DashboardError::Forbidden(_) => StatusCode::FORBIDDEN,
            DashboardError::NotFound(_) => StatusCode::NOT_FOUND,
            DashboardError::Conflict(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            DashboardError::Database(message) => ErrorResponse {
                error: "Internal server error".to_string(),
                message: Some(message.clone()),
            },
            DashboardError::TokenError(_) => ErrorResponse {
                error: "Invalid or expired token".to_string(),
                message: None,
            },
            other => ErrorResponse {
                error: other.to_string(),
                message: None,
            },
        }
    }
}

impl From<tokio::task::JoinError> for DashboardError {
    fn from(err: tokio::task::JoinError) -> Self {
        DashboardError::Internal(err.to_string())
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(self.body())).into_response()
    }
}
