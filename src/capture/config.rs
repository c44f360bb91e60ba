//! Capture device configuration.
//!
//! Resolution and facing preferences are advisory: the hardware may
//! deliver different dimensions, which the device session adopts once
//! the stream is acquired.

use super::ImageFormat;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which way the camera should face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Towards the person in front of the kiosk.
    #[default]
    User,
    /// Away from the person.
    Environment,
}

/// Configuration for one capture device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Camera device index or identifier.
    pub device_id: u32,
    /// Preferred frame width in pixels.
    pub ideal_width: u32,
    /// Preferred frame height in pixels.
    pub ideal_height: u32,
    /// Preferred facing orientation.
    pub facing: FacingMode,
    /// Encoding applied to captured frames.
    pub encoding: ImageFormat,
    /// JPEG quality (1-100), ignored for PNG.
    pub jpeg_quality: u8,
    /// Period of the auto-capture timer.
    pub auto_capture_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            ideal_width: 640,
            ideal_height: 480,
            facing: FacingMode::User,
            encoding: ImageFormat::Jpeg,
            jpeg_quality: 90,
            auto_capture_interval_ms: 3000,
        }
    }
}

impl CaptureConfig {
    /// Creates a new configuration with the specified dimensions.
    pub fn with_dimensions(width: u32, height: u32) -> Self {
        Self {
            ideal_width: width,
            ideal_height: height,
            ..Default::default()
        }
    }

    /// Smaller preview used by the enrollment surface.
    pub fn admin() -> Self {
        Self::with_dimensions(320, 240)
    }

    pub fn auto_capture_interval(&self) -> Duration {
        Duration::from_millis(self.auto_capture_interval_ms)
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ideal_width == 0 || self.ideal_height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(ConfigError::InvalidQuality(self.jpeg_quality));
        }
        if self.auto_capture_interval_ms == 0 {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    #[error("invalid jpeg quality {0} (must be 1-100)")]
    InvalidQuality(u8),
    #[error("auto-capture interval must be greater than zero")]
    InvalidInterval,
    #[error("invalid service url: {0}")]
    InvalidServiceUrl(String),
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = CaptureConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.auto_capture_interval(), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_dimensions_invalid() {
        let mut config = CaptureConfig::default();
        config.ideal_width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDimensions)
        ));
    }

    #[test]
    fn test_quality_out_of_range_invalid() {
        let mut config = CaptureConfig::admin();
        config.jpeg_quality = 101;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidQuality(101))
        ));
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config: CaptureConfig = toml::from_str("ideal_width = 1280\nfacing = \"environment\"").unwrap();
        assert_eq!(config.ideal_width, 1280);
        assert_eq!(config.ideal_height, 480);
        assert_eq!(config.facing, FacingMode::Environment);
    }
}
