//! Presentation collaborators.
//!
//! Workflow components never reach into ambient display state; they are
//! handed a [`Presenter`] at construction and report through it.
//! [`KioskDisplay`] keeps the resulting view state in one place, and
//! [`LogPresenter`] renders it to the terminal.

mod display;

pub use display::{DisplaySnapshot, KioskDisplay, LogPresenter, Modal, StatusMessage};

use crate::capture::EncodedImage;
use crate::service::UserRecord;

/// Severity of a status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StatusLevel::Info => "info",
            StatusLevel::Success => "success",
            StatusLevel::Warning => "warning",
            StatusLevel::Error => "error",
        };
        f.write_str(label)
    }
}

/// Placeholder shown for fields without a value.
pub const EMPTY_FIELD: &str = "-";

/// What the identity panel shows after a recognition attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityView {
    pub name: String,
    pub age: String,
    pub profession: String,
    pub confidence: String,
    pub photo: Option<EncodedImage>,
}

impl IdentityView {
    /// Panel for a recognized user.
    pub fn recognized(user: &UserRecord, confidence: Option<f64>, photo: Option<EncodedImage>) -> Self {
        Self {
            name: user.name.clone(),
            age: user
                .age
                .map(|a| a.to_string())
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
            profession: user
                .profession
                .clone()
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
            confidence: confidence
                .map(format_confidence)
                .unwrap_or_else(|| EMPTY_FIELD.to_string()),
            photo,
        }
    }

    /// Panel for a face the service could not match.
    pub fn unknown(photo: EncodedImage) -> Self {
        Self {
            name: "Unknown".to_string(),
            age: EMPTY_FIELD.to_string(),
            profession: EMPTY_FIELD.to_string(),
            confidence: EMPTY_FIELD.to_string(),
            photo: Some(photo),
        }
    }
}

/// Formats a `[0, 100]` confidence with two decimals.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.2}%", confidence.clamp(0.0, 100.0))
}

/// Receives every user-visible outcome of the workflows.
pub trait Presenter: Send + Sync {
    fn update_status(&self, message: &str, level: StatusLevel);

    fn show_identity(&self, view: IdentityView);

    /// Returns the identity panel to its "no recognition" state.
    fn reset_identity(&self);

    fn show_modal(&self, title: &str, message: &str);

    /// Reflects whether the recognition camera is live (start/stop control).
    fn set_camera_active(&self, active: bool);
}
