//! Inline fallback encoding: downscale, re-encode as JPEG, wrap in a data URI.

use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;

use super::{ImageError, ImageReference};

/// Prefix of every inline-encoded reference.
pub const JPEG_DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Target dimensions for an image of `width` x `height` capped at `max_width`.
///
/// Images at or under the cap keep their size; wider ones are scaled down keeping the
/// aspect ratio, rounding the height and never letting it reach zero.
pub fn capped_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width <= max_width || width == 0 {
        return (width, height);
    }
    let scaled = (height as f64 * max_width as f64 / width as f64).round() as u32;
    (max_width, scaled.max(1))
}

/// Decode `bytes`, cap the width, and produce a JPEG data URI.
///
/// CPU-bound; call from a blocking context.
pub fn encode_inline(
    bytes: &[u8],
    max_width: u32,
    quality: u8,
) -> Result<ImageReference, ImageError> {
    let decoded = image::load_from_memory(bytes).map_err(|e| ImageError::Decode(e.to_string()))?;

    let (width, height) = capped_dimensions(decoded.width(), decoded.height(), max_width);
    let resized = if (width, height) == (decoded.width(), decoded.height()) {
        decoded
    } else {
        decoded.resize_exact(width, height, FilterType::Triangle)
    };

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut jpeg = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut jpeg, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| ImageError::Encode(e.to_string()))?;

    let mut uri = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    uri.push_str(JPEG_DATA_URI_PREFIX);
    general_purpose::STANDARD.encode_string(&jpeg, &mut uri);

    Ok(ImageReference::new(uri))
}
