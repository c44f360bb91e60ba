//! Frame types: raw sensor images, encoded images and captured frames.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

/// Errors raised when turning a data URL back into an image.
#[derive(Debug, Error)]
pub enum ImageDecodeError {
    #[error("unsupported image media type: {0}")]
    UnsupportedFormat(String),
    #[error("image payload is not base64 encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Encoding used for frames exchanged with the recognition service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Returns the media type used in data URLs.
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
        }
    }

    fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            _ => None,
        }
    }
}

/// An uncompressed RGB8 image as delivered by the sensor.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    /// Row-major RGB triplets.
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl RawImage {
    /// Bytes per pixel of the RGB8 layout.
    pub const CHANNELS: usize = 3;

    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            pixels,
            width,
            height,
        }
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the RGB value at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * Self::CHANNELS;
        let px = self.pixels.get(offset..offset + Self::CHANNELS)?;
        Some([px[0], px[1], px[2]])
    }

    /// Validates that the pixel buffer size matches dimensions.
    pub fn is_valid(&self) -> bool {
        self.pixels.len() == self.width as usize * self.height as usize * Self::CHANNELS
    }

    pub(crate) fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

impl std::fmt::Debug for RawImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("pixel_bytes", &self.pixels.len())
            .finish()
    }
}

/// An encoded image payload (JPEG or PNG bytes).
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    format: ImageFormat,
    bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn new(format: ImageFormat, bytes: Vec<u8>) -> Self {
        Self { format, bytes }
    }

    #[inline]
    pub fn format(&self) -> ImageFormat {
        self.format
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Serializes the image as `data:<mime>;base64,<payload>`.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.format.mime(),
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Parses a data URL produced by the service.
    ///
    /// A bare base64 payload without the `data:` header is accepted and
    /// assumed to be JPEG.
    pub fn from_data_url(url: &str) -> Result<Self, ImageDecodeError> {
        let (format, payload) = match url.split_once(',') {
            Some((header, payload)) => {
                let header = header.strip_prefix("data:").unwrap_or(header);
                let mime = header
                    .strip_suffix(";base64")
                    .ok_or(ImageDecodeError::NotBase64)?;
                let format = ImageFormat::from_mime(mime)
                    .ok_or_else(|| ImageDecodeError::UnsupportedFormat(mime.to_string()))?;
                (format, payload)
            }
            None => (ImageFormat::Jpeg, url),
        };

        let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
        Ok(Self { format, bytes })
    }
}

impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

/// One encoded, mirrored image captured from an active device session.
///
/// Frames are immutable once produced. `generation` identifies the
/// device session that produced the frame so late results can be matched
/// against the session that is live when they arrive.
#[derive(Clone)]
pub struct Frame {
    image: EncodedImage,
    width: u32,
    height: u32,
    timestamp: Instant,
    sequence: u64,
    generation: u64,
}

impl Frame {
    /// Creates a new frame with the given parameters.
    pub fn new(image: EncodedImage, width: u32, height: u32, sequence: u64, generation: u64) -> Self {
        Self {
            image,
            width,
            height,
            timestamp: Instant::now(),
            sequence,
            generation,
        }
    }

    #[inline]
    pub fn image(&self) -> &EncodedImage {
        &self.image
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Monotonic sequence number within the owning device.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Generation of the device session that produced this frame.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Serializes the frame for the remote service.
    pub fn to_data_url(&self) -> String {
        self.image.to_data_url()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .field("generation", &self.generation)
            .field("format", &self.image.format)
            .field("encoded_bytes", &self.image.bytes.len())
            .finish()
    }
}
