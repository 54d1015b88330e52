//! Unified error handling
//!
//! `PipelineError` carries the specification pipeline's error kinds;
//! `ApiError` turns them (and request-level failures) into consistent JSON
//! error responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::oracle::TaskKind;

/// Errors raised by the specification pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No valid trades remained after filtering the classifier output.
    #[error("Trade classification failed: {0}")]
    ClassificationFailed(String),

    /// Primary and fallback oracle providers both failed for a task.
    #[error("Drafting oracle unavailable for {task}: {message}")]
    OracleUnavailable { task: TaskKind, message: String },

    /// Oracle output could not be parsed, even after repair.
    #[error("Drafting oracle returned malformed output: {0}")]
    OracleMalformedOutput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Fact store error")]
    Store(#[from] sqlx::Error),

    #[error("Internal error")]
    Internal(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationFailed(msg.into())
    }

    /// Stable machine-readable kind.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ClassificationFailed(_) => "CLASSIFICATION_FAILED",
            Self::OracleUnavailable { .. } => "ORACLE_UNAVAILABLE",
            Self::OracleMalformedOutput(_) => "ORACLE_MALFORMED_OUTPUT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::ValidationFailed(_) => "VALIDATION_FAILED",
            Self::Store(_) => "STORE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Pipeline(e) => match e {
                PipelineError::ClassificationFailed(_) | PipelineError::ValidationFailed(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                PipelineError::OracleUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                PipelineError::OracleMalformedOutput(_) => StatusCode::BAD_GATEWAY,
                PipelineError::NotFound(_) => StatusCode::NOT_FOUND,
                PipelineError::Store(_) | PipelineError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Pipeline(e) => e.code(),
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::Unauthorized(msg) => msg.clone(),
            Self::NotFound(msg) => msg.clone(),
            Self::BadRequest(msg) => msg.clone(),
            // Don't leak internal error details
            Self::Pipeline(PipelineError::Store(_) | PipelineError::Internal(_))
            | Self::Internal(_) => "An internal error occurred".to_string(),
            Self::Pipeline(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Internal(e) | Self::Pipeline(PipelineError::Internal(e)) => {
                tracing::error!(error = ?e, "Internal server error");
            }
            Self::Pipeline(PipelineError::Store(e)) => {
                tracing::error!(error = ?e, "Fact store error");
            }
            _ => {
                tracing::warn!(error = %self, "API error");
            }
        }

        let status = self.status_code();
        let body = ErrorResponse {
            code: self.error_code().to_string(),
            message: self.public_message(),
            request_id: None, // Will be populated by middleware if available
        };

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_kinds_map_to_statuses() {
        let cases = [
            (
                ApiError::from(PipelineError::ClassificationFailed("none".into())),
                StatusCode::UNPROCESSABLE_ENTITY,
                "CLASSIFICATION_FAILED",
            ),
            (
                ApiError::from(PipelineError::OracleUnavailable {
                    task: TaskKind::TradeQuestions,
                    message: "timeout".into(),
                }),
                StatusCode::SERVICE_UNAVAILABLE,
                "ORACLE_UNAVAILABLE",
            ),
            (
                ApiError::from(PipelineError::OracleMalformedOutput("x".into())),
                StatusCode::BAD_GATEWAY,
                "ORACLE_MALFORMED_OUTPUT",
            ),
            (
                ApiError::from(PipelineError::not_found("LV")),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status);
            assert_eq!(err.error_code(), code);
        }
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let err = ApiError::from(PipelineError::Internal(anyhow::anyhow!("secret dsn")));
        assert_eq!(err.public_message(), "An internal error occurred");
    }
}
