use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::analysis::listing::HydrationError;
use crate::analysis::pipeline::PipelineError;
use crate::stores::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<HydrationError> for AppError {
    fn from(e: HydrationError) -> Self {
        match e {
            HydrationError::Store(e) => AppError::Store(e),
            HydrationError::Corrupt(reason) => {
                AppError::Internal(anyhow::anyhow!("stored record is corrupt: {reason}"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Pipeline(e) => {
                tracing::error!("Pipeline failed at stage '{}': {e}", e.stage());
                // The message names the failing stage and carries the cause;
                // the client renders it directly.
                let (status, code) = match e {
                    PipelineError::Upload { .. } => (StatusCode::BAD_GATEWAY, "UPLOAD_FAILED"),
                    PipelineError::Conversion { .. } => {
                        (StatusCode::BAD_GATEWAY, "CONVERSION_FAILED")
                    }
                    PipelineError::Analysis { .. } => (StatusCode::BAD_GATEWAY, "ANALYSIS_FAILED"),
                    PipelineError::Validation { .. } => {
                        (StatusCode::BAD_GATEWAY, "FEEDBACK_REJECTED")
                    }
                    PipelineError::Store { .. } => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR")
                    }
                };
                (status, code, e.to_string())
            }
            AppError::Store(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
