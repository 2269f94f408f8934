use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaymatError {
    #[error("Invalid image: {0}")]
    Decode(String),

    #[error("Invalid overlay name: {0:?}")]
    InvalidOverlay(String),

    #[error("Overlay template '{0}' not found")]
    OverlayNotFound(String),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaymatError {
    /// Whether the failure was caused by the caller's input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PlaymatError::Decode(_)
                | PlaymatError::InvalidOverlay(_)
                | PlaymatError::OverlayNotFound(_)
        )
    }
}
