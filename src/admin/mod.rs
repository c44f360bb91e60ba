//! Administrative surface.
//!
//! Enrollment of new identities on a dedicated capture device, the
//! access-log view, user administration, and the switch between normal
//! and administrative mode.

mod enrollment;
mod logs;
mod session;

pub use enrollment::{AdminEnrollmentFlow, EnrollmentFields};
pub use logs::{LogRow, LogView};
pub use session::{AdminView, Mode, SessionModeCoordinator};

use crate::capture::CameraError;
use crate::service::ServiceError;
use thiserror::Error;

/// Errors surfaced by the administrative workflows.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error("the enrollment camera is not active")]
    NoActiveSession,
    #[error("no photo captured for enrollment")]
    MissingCapture,
    #[error("invalid enrollment: {0}")]
    Validation(String),
    #[error("enrollment rejected: {0}")]
    Rejected(String),
    #[error("administrative mode is not active")]
    NotAdminMode,
    #[error(transparent)]
    Device(#[from] CameraError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}
