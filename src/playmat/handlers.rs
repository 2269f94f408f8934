use super::PlaymatError;
use crate::{AppState, error::ApiError};
use axum::{
    Json,
    body::{Body, Bytes},
    extract::{Multipart, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{path::Path, time::Duration};
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub message: String,
}

/// Liveness probe for `GET /`.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: "Playmat Builder API is running!".to_string(),
    })
}

struct UploadForm {
    file: Bytes,
    overlay: Option<String>,
}

impl UploadForm {
    async fn from_multipart(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut file = None;
        let mut overlay = None;

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("file") => {
                    debug!(
                        "Receiving upload {:?} ({:?})",
                        field.file_name(),
                        field.content_type()
                    );
                    file = Some(field.bytes().await?);
                }
                Some("overlay") => {
                    let value = field.text().await?;
                    let value = value.trim();
                    if !value.is_empty() {
                        overlay = Some(value.to_string());
                    }
                }
                other => debug!("Ignoring unexpected form field {:?}", other),
            }
        }

        Ok(Self {
            file: file.ok_or(ApiError::MissingField("file"))?,
            overlay,
        })
    }
}

/// `POST /upload/`: compose the uploaded image with the selected overlay and return PNG.
#[axum::debug_handler]
pub async fn upload_handler(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = UploadForm::from_multipart(&mut multipart).await?;
    let overlay = form
        .overlay
        .unwrap_or_else(|| app_state.config.overlays.default_overlay.clone());

    info!(
        overlay = %overlay,
        bytes = form.file.len(),
        "Received upload"
    );

    let timeout = Duration::from_secs(app_state.config.uploads.processing_timeout_secs);
    let compositor = app_state.compositor.clone();
    let file = form.file;
    let png = run_blocking(timeout, move || compositor.compose(&file, &overlay)).await?;

    if let Some(output_directory) = &app_state.config.uploads.output_directory {
        persist_output(output_directory, &png).await;
    }

    Ok(png_response(png))
}

/// Run CPU-bound work off the async runtime, giving up after `timeout`.
///
/// A timed-out task keeps running on the blocking pool; its result is dropped.
async fn run_blocking<T, F>(timeout: Duration, work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, PlaymatError> + Send + 'static,
    T: Send + 'static,
{
    let task = tokio::task::spawn_blocking(work);

    let result = tokio::time::timeout(timeout, task)
        .await
        .map_err(|_| ApiError::Timeout(timeout))?
        .map_err(|e| ApiError::Internal(format!("compositing task failed: {}", e)))?;
    Ok(result?)
}

fn png_response(png: Vec<u8>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline; filename=\"playmat.png\""),
    );
    headers.insert(header::CONTENT_LENGTH, png.len().into());

    (StatusCode::OK, headers, Body::from(png)).into_response()
}

/// Keep a copy of the result on disk. Failures only cost the copy, never the response.
async fn persist_output(directory: &Path, png: &[u8]) {
    let path = directory.join(format!("{}.png", uuid::Uuid::new_v4().simple()));
    if let Err(e) = tokio::fs::create_dir_all(directory).await {
        warn!("Failed to create output directory {:?}: {}", directory, e);
        return;
    }
    match tokio::fs::write(&path, png).await {
        Ok(()) => debug!("Saved composed playmat to {:?}", path),
        Err(e) => warn!("Failed to save composed playmat to {:?}: {}", path, e),
    }
}
