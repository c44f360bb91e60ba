//! Mirror transform and frame encoding.

use super::{CameraError, EncodedImage, ImageFormat, RawImage};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};

/// Flips an image horizontally so the output reads like a mirror.
///
/// The pixel at `(x, y)` of the result is the pixel at
/// `(width - 1 - x, y)` of the input.
pub fn mirror_horizontal(raw: &RawImage) -> RawImage {
    let row_bytes = raw.width() as usize * RawImage::CHANNELS;
    if row_bytes == 0 {
        return raw.clone();
    }

    let mut pixels = Vec::with_capacity(raw.pixels().len());
    for row in raw.pixels().chunks_exact(row_bytes) {
        for px in row.chunks_exact(RawImage::CHANNELS).rev() {
            pixels.extend_from_slice(px);
        }
    }
    RawImage::new(pixels, raw.width(), raw.height())
}

/// Encodes an RGB8 image into the requested format.
pub fn encode(raw: RawImage, format: ImageFormat, jpeg_quality: u8) -> Result<EncodedImage, CameraError> {
    if !raw.is_valid() {
        return Err(CameraError::EncodeFailed(format!(
            "pixel buffer does not match {}x{}",
            raw.width(),
            raw.height()
        )));
    }

    let (width, height) = (raw.width(), raw.height());
    let pixels = raw.into_pixels();
    let mut buffer = Vec::new();

    match format {
        ImageFormat::Jpeg => JpegEncoder::new_with_quality(&mut buffer, jpeg_quality)
            .encode(&pixels, width, height, ExtendedColorType::Rgb8),
        ImageFormat::Png => PngEncoder::new(&mut buffer)
            .write_image(&pixels, width, height, ExtendedColorType::Rgb8),
    }
    .map_err(|e| CameraError::EncodeFailed(e.to_string()))?;

    Ok(EncodedImage::new(format, buffer))
}
