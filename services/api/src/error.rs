//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, and how each
//! failure category is rendered to HTTP callers.

use crate::config::ConfigError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use lms_core::CoreError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A categorized failure from the enrollment or assessment engine.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents an error from running the schema migrations.
    #[error("Migration Error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ApiError::Core(CoreError::InvalidInput(message.into()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::invalid_input(rejection.body_text())
    }
}

/// The JSON body of every failed request.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Failure category, e.g. `capacity_exceeded`.
    pub error: String,
    pub message: String,
}

pub fn status_for(err: &CoreError) -> StatusCode {
    match err {
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Forbidden(_) | CoreError::RoleNotPermitted(_) => StatusCode::FORBIDDEN,
        CoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        CoreError::NotEligible(_)
        | CoreError::CapacityExceeded
        | CoreError::AttemptLimitExceeded
        | CoreError::AlreadyCompleted
        | CoreError::TimeLimitExceeded
        | CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::Core(CoreError::Internal(source)) => {
                error!("Internal error: {:?}", source);
                (StatusCode::INTERNAL_SERVER_ERROR, internal_body())
            }
            ApiError::Core(err) => (
                status_for(err),
                ErrorBody {
                    error: err.kind().to_string(),
                    message: err.to_string(),
                },
            ),
            other => {
                error!("Unhandled API error: {:?}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, internal_body())
            }
        };
        (status, Json(body)).into_response()
    }
}

fn internal_body() -> ErrorBody {
    ErrorBody {
        error: "internal".to_string(),
        message: "An internal error occurred".to_string(),
    }
}
