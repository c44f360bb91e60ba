//! Configuration file format.
//!
//! Every section is optional; missing values fall back to the defaults
//! the kiosk ships with.

use crate::capture::{CaptureConfig, ConfigError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    /// Camera used for recognition.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Camera used by the enrollment surface.
    #[serde(default = "CaptureConfig::admin")]
    pub admin_capture: CaptureConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            admin_capture: CaptureConfig::admin(),
            service: ServiceConfig::default(),
            recognition: RecognitionConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Remote recognition service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL all endpoints are appended to.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Bearer token for the administrative endpoints.
    pub auth_token: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000/api".to_string(),
            timeout_secs: 30,
            auth_token: None,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidServiceUrl(self.base_url.clone()));
        }
        Ok(())
    }
}

/// Recognition workflow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Drop results whose frame came from a session that is no longer live.
    pub discard_stale_results: bool,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            discard_stale_results: true,
        }
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { port: 9090 }
    }
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.admin_capture.validate()?;
        self.service.validate()
    }
}
