//! Face Kiosk Library
//!
//! Capture and recognition workflow controller for a face identification
//! kiosk. Frames come from a local camera, are sent to a remote
//! recognition service, and the outcome is reported to a presenter.
//!
//! # Architecture
//!
//! ```text
//! capture ──► recognition ──► presentation
//!    │             │
//!    └──► admin ───┴──► service (HTTP)
//! ```
//!
//! - [`capture`]: camera ownership, one session at a time, mirrored and
//!   encoded frames, optional auto-capture timer.
//! - [`recognition`]: single-flight detect→recognize workflow.
//! - [`admin`]: enrollment on a second device, access logs, user
//!   administration, and the normal/admin mode switch.
//! - [`service`]: the remote recognition service contract and its HTTP
//!   client.
//! - [`presentation`]: where statuses, identities and modals go.
//!
//! # Example
//!
//! ```no_run
//! use face_kiosk::{
//!     capture::{CaptureConfig, CaptureDevice, MockCamera},
//!     config::{RecognitionConfig, ServiceConfig},
//!     presentation::KioskDisplay,
//!     recognition::RecognitionOrchestrator,
//!     service::HttpRemoteService,
//! };
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let device = CaptureDevice::new("normal", MockCamera::new(), CaptureConfig::default());
//! let service = Arc::new(HttpRemoteService::new(&ServiceConfig::default())?);
//! let display = Arc::new(KioskDisplay::new());
//!
//! let orchestrator =
//!     RecognitionOrchestrator::new(device, service, display.clone(), RecognitionConfig::default());
//!
//! orchestrator.start_device()?;
//! let outcome = orchestrator.trigger_recognition().await;
//! println!("{outcome:?}: {:?}", display.snapshot().status);
//! orchestrator.stop_device();
//! # Ok(())
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod admin;
pub mod capture;
pub mod config;
pub mod metrics;
pub mod presentation;
pub mod recognition;
pub mod service;

// Re-export commonly used types at crate root
pub use admin::{AdminEnrollmentFlow, AdminError, SessionModeCoordinator};
pub use capture::{Camera, CaptureConfig, CaptureDevice, Frame, MockCamera};
pub use config::FileConfig;
pub use presentation::{KioskDisplay, Presenter};
pub use recognition::{RecognitionOrchestrator, TriggerOutcome, WorkflowState};
pub use service::{HttpRemoteService, RemoteService, ServiceError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
