use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid artifact: {0}")]
    InvalidArtifact(String),
    #[error("{0}")]
    Inference(String),
    #[error("class index {index} out of range for {classes} classes")]
    UnknownClass { index: usize, classes: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("model not initialized")]
    Uninitialized,
    #[error("failed to load model from {}: {source}", .path.display())]
    LoadFailed { path: PathBuf, #[source] source: ModelError },
}

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("Prediction failed: {0}")]
    Failed(String),
}

impl From<ModelError> for PredictionError {
    fn from(e: ModelError) -> Self { Self::Failed(e.to_string()) }
}

impl From<StoreError> for PredictionError {
    fn from(e: StoreError) -> Self { Self::Failed(e.to_string()) }
}

/// Errors surfaced at the HTTP boundary, rendered as `{"detail": ...}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    RequestFailed(String),
    #[error("{detail}")]
    InvalidBody { status: StatusCode, detail: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::RequestFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidBody { status, .. } => *status,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prediction_error_keeps_cause() {
        let e = PredictionError::from(ModelError::Inference("boom".into()));
        assert_eq!(e.to_string(), "Prediction failed: boom");
        let e = PredictionError::from(StoreError::Uninitialized);
        assert_eq!(e.to_string(), "Prediction failed: model not initialized");
    }

    #[test]
    fn api_error_status_mapping() {
        let r = ApiError::RequestFailed("Prediction failed: boom".into()).into_response();
        assert_eq!(r.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let r = ApiError::InvalidBody { status: StatusCode::UNPROCESSABLE_ENTITY, detail: "bad".into() }.into_response();
        assert_eq!(r.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
