//! Typed error hierarchy for the assertion service, mapped to HTTP responses
//! at the boundary the same way `acton_service::error::Error` does.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("gone: {0}")]
    Gone(String),

    #[error("idempotency: {0}")]
    Idempotency(String),

    #[error("revision conflict: {0}")]
    RevisionConflict(String),

    #[error("graph store error: {0}")]
    Graph(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Gone(_) => "GONE",
            AppError::Idempotency(_) => "IDEMPOTENCY_PENDING",
            AppError::RevisionConflict(_) => "REVISION_CONFLICT",
            AppError::Graph(_) => "GRAPH_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gone(_) => StatusCode::GONE,
            AppError::Idempotency(_) => StatusCode::CONFLICT,
            AppError::RevisionConflict(_) => StatusCode::CONFLICT,
            AppError::Graph(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        if status.is_server_error() {
            tracing::error!(status = %status, code, "{self}");
        } else {
            tracing::warn!(status = %status, code, near_miss = true, "{self}");
        }

        let body = ErrorBody {
            status: status.as_u16(),
            code,
            message: self.to_string(),
            details: None,
        };

        (status, Json(body)).into_response()
    }
}

impl From<neo4rs::Error> for AppError {
    fn from(e: neo4rs::Error) -> Self {
        AppError::Graph(e.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(format!("database error: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_400() {
        let err = AppError::Validation("ERR_EMPTY_ASSERTION".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn gone_maps_to_410() {
        let err = AppError::Gone("reply to tombstoned assertion".into());
        assert_eq!(err.status(), StatusCode::GONE);
    }

    #[test]
    fn revision_conflict_maps_to_409() {
        let err = AppError::RevisionConflict("supersedesId already claimed".into());
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
