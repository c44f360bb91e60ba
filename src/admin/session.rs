//! Normal/administrative mode switch.
//!
//! Leaving a mode always stops that mode's capture device first, so the
//! normal and admin cameras are never both asked to start by one
//! transition. The normal device is stopped through its orchestrator so
//! the workflow state and the display follow.

use super::{AdminEnrollmentFlow, AdminError, EnrollmentFields, LogView};
use crate::recognition::RecognitionOrchestrator;
use crate::service::{
    DeleteReceipt, EnrollmentReceipt, RemoteService, UserRecord, DEFAULT_LOG_LIMIT,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Normal,
    Admin,
}

/// Sub-view open inside admin mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminView {
    Enrollment,
    Logs,
}

#[derive(Debug, Default)]
struct ModeState {
    mode: Mode,
    view: Option<AdminView>,
    logs: Option<LogView>,
}

pub struct SessionModeCoordinator {
    recognition: Arc<RecognitionOrchestrator>,
    enrollment: AdminEnrollmentFlow,
    service: Arc<dyn RemoteService>,
    state: Mutex<ModeState>,
}

impl SessionModeCoordinator {
    /// `recognition` owns the normal device; `enrollment` owns the admin one.
    pub fn new(
        recognition: Arc<RecognitionOrchestrator>,
        enrollment: AdminEnrollmentFlow,
        service: Arc<dyn RemoteService>,
    ) -> Self {
        Self {
            recognition,
            enrollment,
            service,
            state: Mutex::new(ModeState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ModeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mode(&self) -> Mode {
        self.state().mode
    }

    pub fn is_admin(&self) -> bool {
        self.mode() == Mode::Admin
    }

    pub fn view(&self) -> Option<AdminView> {
        self.state().view
    }

    /// The last log view fetched, while the log view is open.
    pub fn logs(&self) -> Option<LogView> {
        self.state().logs.clone()
    }

    pub fn enrollment(&self) -> &AdminEnrollmentFlow {
        &self.enrollment
    }

    pub fn recognition(&self) -> &RecognitionOrchestrator {
        &self.recognition
    }

    /// Flips between normal and admin mode and returns the new mode.
    ///
    /// Entering admin mode does not start the enrollment camera.
    pub fn toggle(&self) -> Mode {
        let mut state = self.state();
        state.mode = match state.mode {
            Mode::Normal => {
                if self.recognition.stop_device() {
                    tracing::debug!("Recognition camera stopped on entering admin mode");
                }
                state.view = None;
                Mode::Admin
            }
            Mode::Admin => {
                state.view = None;
                state.logs = None;
                self.enrollment.cancel();
                Mode::Normal
            }
        };
        tracing::info!(mode = ?state.mode, "Mode changed");
        state.mode
    }

    fn require_admin(&self) -> Result<(), AdminError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AdminError::NotAdminMode)
        }
    }

    /// Shows the enrollment form and starts the enrollment camera.
    pub fn open_enrollment(&self) -> Result<(), AdminError> {
        self.require_admin()?;
        {
            let mut state = self.state();
            state.view = Some(AdminView::Enrollment);
            state.logs = None;
        }
        self.enrollment.enter()
    }

    pub fn capture_for_enrollment(&self) -> Result<(), AdminError> {
        self.require_admin()?;
        self.enrollment.capture_for_enrollment()
    }

    /// Submits the enrollment form; closes it on success.
    pub async fn submit_enrollment(
        &self,
        fields: EnrollmentFields,
    ) -> Result<EnrollmentReceipt, AdminError> {
        self.require_admin()?;
        let receipt = self.enrollment.submit(fields).await?;
        let mut state = self.state();
        if state.view == Some(AdminView::Enrollment) {
            state.view = None;
        }
        Ok(receipt)
    }

    /// Closes the enrollment form, stopping its camera.
    pub fn cancel_enrollment(&self) {
        {
            let mut state = self.state();
            if state.view == Some(AdminView::Enrollment) {
                state.view = None;
            }
        }
        self.enrollment.cancel();
    }

    /// Shows the access log, newest entries first.
    ///
    /// A failed fetch produces a view carrying the error rather than an
    /// `Err`.
    pub async fn open_logs(&self, limit: usize) -> Result<LogView, AdminError> {
        self.require_admin()?;
        {
            let mut state = self.state();
            state.view = Some(AdminView::Logs);
            state.logs = None;
        }
        self.enrollment.suspend();

        let view = match self.service.get_logs(limit).await {
            Ok(entries) => LogView::from_entries(entries),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch logs");
                LogView::failed(e.to_string())
            }
        };

        let mut state = self.state();
        if state.view == Some(AdminView::Logs) {
            state.logs = Some(view.clone());
        }
        Ok(view)
    }

    pub async fn open_default_logs(&self) -> Result<LogView, AdminError> {
        self.open_logs(DEFAULT_LOG_LIMIT).await
    }

    pub fn close_logs(&self) {
        let mut state = self.state();
        if state.view == Some(AdminView::Logs) {
            state.view = None;
        }
        state.logs = None;
    }

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, AdminError> {
        self.require_admin()?;
        Ok(self.service.get_users().await?)
    }

    pub async fn delete_user(&self, user_id: &str) -> Result<DeleteReceipt, AdminError> {
        self.require_admin()?;
        let receipt = self.service.delete_user(user_id).await?;
        tracing::info!(user_id, success = receipt.success, "User deletion requested");
        Ok(receipt)
    }
}
