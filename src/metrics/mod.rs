//! Prometheus metrics exporter for kiosk monitoring.
//!
//! # Metrics Exposed
//!
//! ## Recognition
//! - `face_kiosk_recognition_attempts_total` - Attempts that reached capture
//! - `face_kiosk_recognition_outcomes_total{outcome}` - Attempts by outcome
//!   (`recognized`, `not_recognized`, `no_face`, `capture_failed`, `failed`,
//!   `discarded`)
//! - `face_kiosk_recognition_dropped_total` - Triggers dropped while busy
//!
//! ## Devices and enrollment
//! - `face_kiosk_device_active` - Recognition camera state (1=active)
//! - `face_kiosk_enrollments_total` - Successful enrollments
//!
//! The HTTP exporter needs the `metrics` feature.
//!
//! # Example
//!
//! ```no_run
//! use face_kiosk::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! registry.update(&MetricsSnapshot {
//!     attempts: 12,
//!     recognized: 9,
//!     dropped: 2,
//!     device_active: true,
//!     ..MetricsSnapshot::default()
//! });
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::MetricsServer;
