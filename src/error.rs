use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::playmat::PlaymatError;

/// Errors surfaced by HTTP handlers. Every variant renders as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Playmat(#[from] PlaymatError),

    #[error("Missing form field: {0}")]
    MissingField(&'static str),

    #[error("Malformed upload: {message}")]
    Multipart { status: StatusCode, message: String },

    #[error("Image processing timed out after {0:?}")]
    Timeout(Duration),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ApiError::Multipart {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Playmat(err) => match err {
                PlaymatError::InvalidOverlay(_) => StatusCode::BAD_REQUEST,
                PlaymatError::OverlayNotFound(_) => StatusCode::NOT_FOUND,
                PlaymatError::Decode(_)
                | PlaymatError::ImageError(_)
                | PlaymatError::IoError(_)
                | PlaymatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::MissingField(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Multipart { status, .. } => *status,
            ApiError::Timeout(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 500s whose message is safe to hand back: a bad upload and a timeout carry no paths.
    fn is_public(&self) -> bool {
        matches!(
            self,
            ApiError::Playmat(PlaymatError::Decode(_)) | ApiError::Timeout(_)
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            if self.is_public() {
                self.to_string()
            } else {
                // Internal details (paths, decoder internals) stay in the log
                "Image processing failed".to_string()
            }
        } else {
            tracing::warn!(error = %self, status = %status, "Rejected request");
            self.to_string()
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
