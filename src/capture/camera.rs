//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::{CaptureConfig, RawImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// Permission denied or no capture hardware present.
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// The operation needs an active device session.
    #[error("no active capture session")]
    NoActiveSession,
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    #[error("failed to encode frame: {0}")]
    EncodeFailed(String),
}

/// Dimensions actually delivered by the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Trait for camera implementations.
///
/// This abstraction allows swapping between real camera hardware
/// and mock implementations for testing. Implementations deliver raw,
/// unmirrored RGB8 images; mirroring and encoding happen in the device.
pub trait Camera: Send {
    /// Acquires the stream and returns the resolution the hardware settled on.
    fn open(&mut self, config: &CaptureConfig) -> Result<Resolution, CameraError>;

    /// Reads the current sensor image.
    fn capture(&mut self) -> Result<RawImage, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases all underlying tracks.
    fn close(&mut self);
}

impl Camera for Box<dyn Camera> {
    fn open(&mut self, config: &CaptureConfig) -> Result<Resolution, CameraError> {
        (**self).open(config)
    }

    fn capture(&mut self) -> Result<RawImage, CameraError> {
        (**self).capture()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Open/close counters shared with a [`MockCamera`].
#[derive(Debug, Clone, Default)]
pub struct MockCameraStats {
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    captures: Arc<AtomicUsize>,
}

impl MockCameraStats {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

/// Mock camera that generates synthetic frames.
///
/// The pattern depends on the pixel column, so mirrored output can be
/// checked against [`MockCamera::sensor_pixel`].
#[derive(Debug, Default)]
pub struct MockCamera {
    resolution: Option<Resolution>,
    native: Option<Resolution>,
    unavailable: bool,
    sequence: u64,
    stats: MockCameraStats,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// A camera that ignores the requested size and always delivers `width`x`height`.
    pub fn with_native_resolution(width: u32, height: u32) -> Self {
        Self {
            native: Some(Resolution::new(width, height)),
            ..Self::default()
        }
    }

    /// A camera whose acquisition always fails, as if permission was denied.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Returns counters that stay valid after the camera is moved into a device.
    pub fn stats(&self) -> MockCameraStats {
        self.stats.clone()
    }

    /// The raw sensor value at `(x, y)` for capture number `sequence`.
    pub fn sensor_pixel(x: u32, y: u32, sequence: u64) -> [u8; 3] {
        [
            (x % 256) as u8,
            (y % 256) as u8,
            ((x as u64 * 7 + y as u64 * 3 + sequence) % 256) as u8,
        ]
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<Resolution, CameraError> {
        if self.unavailable {
            return Err(CameraError::DeviceUnavailable(
                "permission denied".to_string(),
            ));
        }
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let resolution = self
            .native
            .unwrap_or_else(|| Resolution::new(config.ideal_width, config.ideal_height));
        self.resolution = Some(resolution);
        self.sequence = 0;
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        tracing::info!(?resolution, "MockCamera opened");
        Ok(resolution)
    }

    fn capture(&mut self) -> Result<RawImage, CameraError> {
        let resolution = self.resolution.ok_or(CameraError::NoActiveSession)?;

        self.sequence += 1;
        let mut pixels =
            Vec::with_capacity(resolution.width as usize * resolution.height as usize * RawImage::CHANNELS);
        for y in 0..resolution.height {
            for x in 0..resolution.width {
                pixels.extend_from_slice(&Self::sensor_pixel(x, y, self.sequence));
            }
        }

        self.stats.captures.fetch_add(1, Ordering::SeqCst);
        Ok(RawImage::new(pixels, resolution.width, resolution.height))
    }

    fn is_open(&self) -> bool {
        self.resolution.is_some()
    }

    fn close(&mut self) {
        if self.resolution.take().is_some() {
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
            tracing::info!("MockCamera closed");
        }
    }
}
