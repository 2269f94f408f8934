use crate::Config;
use crate::playmat::validate_selector;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Overlay template directory does not exist: {0}")]
    OverlayDirectoryMissing(String),

    #[error("Default overlay template missing: {0}")]
    DefaultOverlayMissing(String),

    #[error("Failed to create output directory: {0}")]
    OutputDirectoryCreationFailed(#[from] std::io::Error),
}

impl StartupCheckError {
    /// Critical failures stop the server from starting.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            StartupCheckError::OverlayDirectoryMissing(_)
                | StartupCheckError::OutputDirectoryCreationFailed(_)
        )
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    let overlay_dir = &config.overlays.directory;
    if !overlay_dir.is_dir() {
        error!("Overlay template directory does not exist: {:?}", overlay_dir);
        errors.push(StartupCheckError::OverlayDirectoryMissing(
            overlay_dir.display().to_string(),
        ));
    } else {
        info!("Overlay template directory exists: {:?}", overlay_dir);

        let default_overlay = &config.overlays.default_overlay;
        let default_path = overlay_dir.join(format!("{}_lines.png", default_overlay));
        if validate_selector(default_overlay).is_ok() && default_path.is_file() {
            info!("Default overlay template found: {:?}", default_path);
        } else {
            warn!(
                "Default overlay '{}' has no template at {:?}; uploads without an overlay will fail",
                default_overlay, default_path
            );
            errors.push(StartupCheckError::DefaultOverlayMissing(
                default_overlay.clone(),
            ));
        }
    }

    if let Some(output_dir) = &config.uploads.output_directory {
        if !output_dir.exists() {
            info!("Output directory does not exist, creating: {:?}", output_dir);
            if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
                error!("Failed to create output directory {:?}: {}", output_dir, e);
                errors.push(StartupCheckError::OutputDirectoryCreationFailed(e));
            }
        } else {
            info!("Output directory exists: {:?}", output_dir);
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
