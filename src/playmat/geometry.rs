use image::{RgbaImage, imageops::FilterType};
use tracing::debug;

use super::types::{CanvasSize, CropRegion};

/// Filter used for every resize. Photographic uploads need a Lanczos-class kernel.
pub const RESAMPLE_FILTER: FilterType = FilterType::Lanczos3;

/// Compute the centered crop that gives a `width` x `height` source the canvas aspect ratio.
///
/// Aspect ratios are compared with exact integer arithmetic. Extents are floored and
/// offsets use floor division, so an odd margin leaves the extra pixel on the right
/// (or bottom). Equal aspect ratios take the vertical branch and crop nothing.
pub fn crop_region(width: u32, height: u32, canvas: CanvasSize) -> CropRegion {
    let (w, h) = (width as u64, height as u64);
    let (cw, ch) = (canvas.width as u64, canvas.height as u64);

    if w * ch > cw * h {
        // Wider than the canvas: keep full height, trim left and right
        let new_width = ((cw * h) / ch).max(1).min(w) as u32;
        CropRegion {
            x: (width - new_width) / 2,
            y: 0,
            width: new_width,
            height,
        }
    } else {
        // Taller than (or equal to) the canvas: keep full width, trim top and bottom
        let new_height = ((w * ch) / cw).max(1).min(h) as u32;
        CropRegion {
            x: 0,
            y: (height - new_height) / 2,
            width,
            height: new_height,
        }
    }
}

/// Center-crop to the canvas aspect ratio, then resize to exactly the canvas size.
pub fn normalize(image: &RgbaImage, canvas: CanvasSize) -> RgbaImage {
    let (width, height) = image.dimensions();
    let region = crop_region(width, height, canvas);
    debug!(
        "Normalizing {}x{} source, crop region {:?}",
        width, height, region
    );

    if region.is_full(width, height) && (width, height) == canvas.dimensions() {
        return image.clone();
    }

    let cropped = if region.is_full(width, height) {
        image.clone()
    } else {
        image::imageops::crop_imm(image, region.x, region.y, region.width, region.height)
            .to_image()
    };

    image::imageops::resize(&cropped, canvas.width, canvas.height, RESAMPLE_FILTER)
}
