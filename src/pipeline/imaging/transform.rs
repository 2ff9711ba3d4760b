//! Quarter-turn rotation of encoded scan images.
//!
//! Rotated output is re-encoded as JPEG at the configured quality. A zero
//! rotation returns the input handle untouched so no generation loss occurs.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageOutputFormat};

use crate::models::{ImageBuffer, Rotation};
use crate::pipeline::extraction::ExtractionError;

/// Rotate `buffer` clockwise by `rotation`.
///
/// For 90° and 270° the output canvas has width and height swapped.
pub fn rotate(buffer: &ImageBuffer, rotation: Rotation, jpeg_quality: u8) -> Result<ImageBuffer, ExtractionError> {
    if rotation.is_identity() {
        return Ok(buffer.clone());
    }
    if buffer.is_empty() {
        return Err(ExtractionError::EmptyImage);
    }

    let decoded = image::load_from_memory(buffer.as_bytes())
        .map_err(|e| ExtractionError::ImageProcessing(format!("Image decode failed: {e}")))?;
    let (width, height) = decoded.dimensions();

    let rotated = apply_rotation(decoded, rotation);
    tracing::debug!(
        degrees = rotation.degrees(),
        from = %format!("{width}x{height}"),
        to = %format!("{}x{}", rotated.width(), rotated.height()),
        "Rotated image"
    );

    encode_jpeg(&rotated, jpeg_quality).map(ImageBuffer::new)
}

/// [`rotate`] on the blocking pool, keeping decode/encode off the async workers.
pub async fn rotate_async(
    buffer: ImageBuffer,
    rotation: Rotation,
    jpeg_quality: u8,
) -> Result<ImageBuffer, ExtractionError> {
    if rotation.is_identity() {
        return Ok(buffer);
    }
    tokio::task::spawn_blocking(move || rotate(&buffer, rotation, jpeg_quality))
        .await
        .map_err(|e| ExtractionError::ImageProcessing(format!("Rotation task failed: {e}")))?
}

fn apply_rotation(img: DynamicImage, rotation: Rotation) -> DynamicImage {
    match rotation {
        Rotation::Deg0 => img,
        Rotation::Deg90 => img.rotate90(),
        Rotation::Deg180 => img.rotate180(),
        Rotation::Deg270 => img.rotate270(),
    }
}

/// Encode as JPEG. Alpha is dropped since JPEG cannot carry it.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ExtractionError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut cursor = Cursor::new(Vec::new());
    rgb.write_to(&mut cursor, ImageOutputFormat::Jpeg(quality.clamp(1, 100)))
        .map_err(|e| ExtractionError::ImageProcessing(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Decoded pixel dimensions of an encoded image.
pub fn dimensions(buffer: &ImageBuffer) -> Result<(u32, u32), ExtractionError> {
    image::load_from_memory(buffer.as_bytes())
        .map(|img| img.dimensions())
        .map_err(|e| ExtractionError::ImageProcessing(format!("Image decode failed: {e}")))
}
