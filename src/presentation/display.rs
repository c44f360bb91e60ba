//! Concrete presenters.

use super::{IdentityView, Presenter, StatusLevel};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modal {
    pub title: String,
    pub message: String,
}

/// Point-in-time copy of everything the kiosk screen shows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplaySnapshot {
    pub status: Option<StatusMessage>,
    /// `None` means the "no recognition" placeholder is visible.
    pub identity: Option<IdentityView>,
    pub modal: Option<Modal>,
    pub camera_active: bool,
    /// Number of status updates received so far.
    pub status_updates: u64,
}

/// Application display state shared by all workflow components.
#[derive(Debug, Default)]
pub struct KioskDisplay {
    state: Mutex<DisplaySnapshot>,
}

impl KioskDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, DisplaySnapshot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        self.state().clone()
    }

    pub fn dismiss_modal(&self) {
        self.state().modal = None;
    }
}

impl Presenter for KioskDisplay {
    fn update_status(&self, message: &str, level: StatusLevel) {
        let mut state = self.state();
        state.status = Some(StatusMessage {
            text: message.to_string(),
            level,
        });
        state.status_updates += 1;
    }

    fn show_identity(&self, view: IdentityView) {
        self.state().identity = Some(view);
    }

    fn reset_identity(&self) {
        self.state().identity = None;
    }

    fn show_modal(&self, title: &str, message: &str) {
        self.state().modal = Some(Modal {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn set_camera_active(&self, active: bool) {
        self.state().camera_active = active;
    }
}

/// Presenter for the command-line kiosk: statuses go to the log,
/// identities and dialogs to stdout.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn update_status(&self, message: &str, level: StatusLevel) {
        match level {
            StatusLevel::Error => tracing::error!(status = %level, "{message}"),
            StatusLevel::Warning => tracing::warn!(status = %level, "{message}"),
            StatusLevel::Info | StatusLevel::Success => tracing::info!(status = %level, "{message}"),
        }
    }

    fn show_identity(&self, view: IdentityView) {
        println!(
            "{} | Age: {} | Profession: {} | Confidence: {}",
            view.name, view.age, view.profession, view.confidence
        );
    }

    fn reset_identity(&self) {
        tracing::debug!("Identity panel reset");
    }

    fn show_modal(&self, title: &str, message: &str) {
        println!("[{title}] {message}");
    }

    fn set_camera_active(&self, active: bool) {
        tracing::debug!(active, "Camera control updated");
    }
}
