//! Camera input and frame handling.
//!
//! This module provides abstractions for driving a camera, managing its
//! configuration and turning sensor images into mirrored, encoded frames
//! ready for the recognition service.

mod camera;
mod config;
mod device;
mod encode;
mod frame;
#[cfg(feature = "camera")]
mod nokhwa_camera;

pub use camera::{Camera, CameraError, MockCamera, MockCameraStats, Resolution};
pub use config::{CaptureConfig, ConfigError, FacingMode};
pub use device::{CaptureDevice, DeviceSession};
pub use encode::{encode, mirror_horizontal};
pub use frame::{EncodedImage, Frame, ImageDecodeError, ImageFormat, RawImage};
#[cfg(feature = "camera")]
pub use nokhwa_camera::NokhwaCamera;
