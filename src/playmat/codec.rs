use image::{DynamicImage, ImageReader, Limits, RgbaImage, codecs::png::PngEncoder};
use std::io::Cursor;
use tracing::debug;

use super::error::PlaymatError;
use super::types::DecodeLimits;

/// Decode uploaded bytes into RGBA8, guessing the format from the content.
///
/// Every failure here is the caller's fault and maps to [`PlaymatError::Decode`].
pub fn decode(bytes: &[u8], limits: DecodeLimits) -> Result<RgbaImage, PlaymatError> {
    if bytes.is_empty() {
        return Err(PlaymatError::Decode("empty upload".to_string()));
    }

    let mut reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PlaymatError::Decode(e.to_string()))?;

    let detected_format = reader.format();
    if detected_format.is_none() {
        return Err(PlaymatError::Decode(
            "unrecognized image format".to_string(),
        ));
    }

    let mut decoder_limits = Limits::default();
    decoder_limits.max_image_width = Some(limits.max_dimension);
    decoder_limits.max_image_height = Some(limits.max_dimension);
    reader.limits(decoder_limits);

    let img = reader
        .decode()
        .map_err(|e| PlaymatError::Decode(e.to_string()))?;

    if img.width() == 0 || img.height() == 0 {
        return Err(PlaymatError::Decode(format!(
            "image has zero dimension ({}x{})",
            img.width(),
            img.height()
        )));
    }

    debug!(
        "Decoded {:?} upload: {}x{} {:?}",
        detected_format,
        img.width(),
        img.height(),
        img.color()
    );

    Ok(img.to_rgba8())
}

/// Encode an RGBA buffer as PNG in memory.
pub fn encode_png(image: RgbaImage) -> Result<Vec<u8>, PlaymatError> {
    let mut buffer = Vec::new();
    let encoder = PngEncoder::new(&mut buffer);
    DynamicImage::ImageRgba8(image).write_with_encoder(encoder)?;
    Ok(buffer)
}
