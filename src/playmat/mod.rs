// Playmat module - upload normalization and overlay compositing
mod codec;
mod error;
mod geometry;
mod handlers;
mod overlay;
mod types;

pub use codec::{decode, encode_png};
pub use error::PlaymatError;
pub use geometry::{crop_region, normalize};
pub use handlers::{HealthResponse, health_handler, upload_handler};
pub use overlay::{OverlayStore, validate_selector};
pub use types::{CanvasSize, CropRegion, DecodeLimits};

use image::RgbaImage;
use tracing::debug;

/// Turns an uploaded photo into a playmat: crop, resize, overlay, encode.
pub struct Compositor {
    canvas: CanvasSize,
    overlays: OverlayStore,
    limits: DecodeLimits,
}

impl Compositor {
    pub fn new(canvas: CanvasSize, overlays: OverlayStore, limits: DecodeLimits) -> Self {
        Self {
            canvas,
            overlays,
            limits,
        }
    }

    pub fn from_config(config: &crate::Config) -> Result<Self, PlaymatError> {
        let canvas = CanvasSize::try_from(config.canvas).map_err(PlaymatError::Internal)?;
        let overlays = OverlayStore::new(config.overlays.directory.clone(), canvas);
        let limits = DecodeLimits {
            max_dimension: config.uploads.max_dimension,
        };
        Ok(Self::new(canvas, overlays, limits))
    }

    pub fn canvas(&self) -> CanvasSize {
        self.canvas
    }

    pub fn overlays(&self) -> &OverlayStore {
        &self.overlays
    }

    /// Compose `bytes` with the overlay named `selector` and return PNG bytes.
    ///
    /// Blocking and CPU-bound. Decode errors take precedence over overlay errors.
    pub fn compose(&self, bytes: &[u8], selector: &str) -> Result<Vec<u8>, PlaymatError> {
        let source = decode(bytes, self.limits)?;
        let composed = self.compose_image(&source, selector)?;
        encode_png(composed)
    }

    /// Normalize a decoded image and alpha-composite the overlay over it.
    pub fn compose_image(
        &self,
        source: &RgbaImage,
        selector: &str,
    ) -> Result<RgbaImage, PlaymatError> {
        let mut base = normalize(source, self.canvas);
        let overlay = self.overlays.get(selector)?;
        debug!(
            "Compositing overlay '{}' onto {}x{} canvas",
            selector, self.canvas.width, self.canvas.height
        );

        image::imageops::overlay(&mut base, overlay.as_ref(), 0, 0);
        Ok(base)
    }
}
