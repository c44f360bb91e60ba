//! Enrollment of a new identity.
//!
//! The flow owns its own capture device, independent of the recognition
//! one. A captured frame stays pending until a submission succeeds or
//! the flow is cancelled.

use super::AdminError;
use crate::capture::{CameraError, CaptureDevice, Frame};
use crate::presentation::Presenter;
use crate::service::{EnrollmentReceipt, EnrollmentRequest, RemoteService};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Form fields entered by the administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentFields {
    pub name: String,
    pub age: u32,
    pub profession: String,
}

impl EnrollmentFields {
    pub fn new(name: impl Into<String>, age: u32, profession: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age,
            profession: profession.into(),
        }
    }

    /// All fields are required.
    pub fn validate(&self) -> Result<(), AdminError> {
        if self.name.trim().is_empty() {
            return Err(AdminError::Validation("name is required".to_string()));
        }
        if self.age == 0 {
            return Err(AdminError::Validation("age is required".to_string()));
        }
        if self.profession.trim().is_empty() {
            return Err(AdminError::Validation("profession is required".to_string()));
        }
        Ok(())
    }
}

pub struct AdminEnrollmentFlow {
    device: CaptureDevice,
    service: Arc<dyn RemoteService>,
    presenter: Arc<dyn Presenter>,
    pending: Mutex<Option<Frame>>,
    enrolled: AtomicU64,
}

impl AdminEnrollmentFlow {
    pub fn new(
        device: CaptureDevice,
        service: Arc<dyn RemoteService>,
        presenter: Arc<dyn Presenter>,
    ) -> Self {
        Self {
            device,
            service,
            presenter,
            pending: Mutex::new(None),
            enrolled: AtomicU64::new(0),
        }
    }

    pub fn device(&self) -> &CaptureDevice {
        &self.device
    }

    fn pending(&self) -> MutexGuard<'_, Option<Frame>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn has_pending_capture(&self) -> bool {
        self.pending().is_some()
    }

    pub fn pending_capture(&self) -> Option<Frame> {
        self.pending().clone()
    }

    /// Number of successful enrollments since creation.
    pub fn enrolled_count(&self) -> u64 {
        self.enrolled.load(Ordering::Relaxed)
    }

    /// Opens the enrollment camera. Re-entering while it runs keeps the
    /// current session.
    pub fn enter(&self) -> Result<(), AdminError> {
        if self.device.is_running() {
            return Ok(());
        }
        if let Err(e) = self.device.start() {
            self.presenter.show_modal(
                "Error",
                "Unable to access the camera for enrollment. Please check permissions.",
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Captures the photo to enroll, replacing any earlier one.
    pub fn capture_for_enrollment(&self) -> Result<(), AdminError> {
        if !self.device.is_running() {
            self.presenter.show_modal(
                "Error",
                "The camera is not active. Please try again.",
            );
            return Err(AdminError::NoActiveSession);
        }
        let Some(frame) = self.device.capture_frame() else {
            self.presenter
                .show_modal("Error", "Unable to capture the photo. Please try again.");
            return Err(CameraError::CaptureFailed("no frame from the enrollment camera".to_string()).into());
        };

        tracing::debug!(sequence = frame.sequence(), "Enrollment photo captured");
        *self.pending() = Some(frame);
        Ok(())
    }

    /// Sends the pending photo and `fields` to the service.
    ///
    /// On success the pending photo is cleared and the camera stopped, unless
    /// the flow was re-entered while the request was pending. On failure
    /// nothing changes, so the same photo can be submitted again.
    pub async fn submit(&self, fields: EnrollmentFields) -> Result<EnrollmentReceipt, AdminError> {
        let Some(frame) = self.pending_capture() else {
            self.presenter.show_modal(
                "Error",
                "Please capture a photo before submitting the form.",
            );
            return Err(AdminError::MissingCapture);
        };
        if let Err(e) = fields.validate() {
            self.presenter.show_modal("Error", &e.to_string());
            return Err(e);
        }

        let submitted = (frame.generation(), frame.sequence());
        let request = EnrollmentRequest {
            name: fields.name,
            age: fields.age,
            profession: fields.profession,
            frame,
        };

        let receipt = match self.service.add_user(&request).await {
            Ok(receipt) => receipt,
            Err(e) => {
                tracing::warn!(error = %e, "Enrollment request failed");
                self.presenter
                    .show_modal("Error", &format!("An error occurred: {e}"));
                return Err(e.into());
            }
        };

        if !receipt.success {
            let message = receipt
                .error
                .clone()
                .unwrap_or_else(|| "An error occurred while adding the user.".to_string());
            self.presenter.show_modal("Error", &message);
            return Err(AdminError::Rejected(message));
        }

        {
            let mut pending = self.pending();
            let unchanged = pending
                .as_ref()
                .is_some_and(|f| (f.generation(), f.sequence()) == submitted);
            if unchanged {
                *pending = None;
            }
        }
        if self.device.current_generation() == Some(submitted.0) {
            self.device.stop();
        }
        self.enrolled.fetch_add(1, Ordering::Relaxed);

        tracing::info!(name = %request.name, user_id = ?receipt.user_id, "User enrolled");
        self.presenter.show_modal(
            "Success",
            &format!("User {} was added successfully.", request.name),
        );
        Ok(receipt)
    }

    /// Stops the camera without touching the pending photo.
    pub(crate) fn suspend(&self) {
        self.device.stop();
    }

    /// Leaves the flow: stops the camera and discards the pending photo.
    pub fn cancel(&self) {
        self.device.stop();
        if self.pending().take().is_some() {
            tracing::debug!("Pending enrollment photo discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Camera, CaptureConfig, MockCamera, MockCameraStats, RawImage, Resolution};
    use crate::presentation::KioskDisplay;
    use crate::service::mock::MockService;
    use crate::service::ServiceError;

    struct Harness {
        flow: AdminEnrollmentFlow,
        service: Arc<MockService>,
        display: Arc<KioskDisplay>,
        camera: MockCameraStats,
    }

    /// Opens normally but never delivers an image.
    struct BrokenSensor {
        open: bool,
    }

    impl Camera for BrokenSensor {
        fn open(&mut self, config: &CaptureConfig) -> Result<Resolution, CameraError> {
            self.open = true;
            Ok(Resolution::new(config.ideal_width, config.ideal_height))
        }

        fn capture(&mut self) -> Result<RawImage, CameraError> {
            Err(CameraError::CaptureFailed("sensor timeout".to_string()))
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    fn harness_with(camera: MockCamera) -> Harness {
        let stats = camera.stats();
        let service = MockService::new();
        let display = Arc::new(KioskDisplay::new());
        let device = CaptureDevice::new("admin", camera, CaptureConfig::with_dimensions(8, 6));
        Harness {
            flow: AdminEnrollmentFlow::new(device, service.clone(), display.clone()),
            service,
            display,
            camera: stats,
        }
    }

    fn harness() -> Harness {
        harness_with(MockCamera::new())
    }

    fn ana() -> EnrollmentFields {
        EnrollmentFields::new("Ana", 30, "Engineer")
    }

    #[test]
    fn test_enter_is_idempotent() {
        let h = harness();
        h.flow.enter().unwrap();
        h.flow.enter().unwrap();

        assert!(h.flow.device().is_running());
        assert_eq!(h.camera.opens(), 1);
    }

    #[test]
    fn test_enter_reports_unavailable_camera() {
        let h = harness_with(MockCamera::unavailable());

        assert!(matches!(h.flow.enter(), Err(AdminError::Device(_))));
        assert!(h.display.snapshot().modal.is_some());
    }

    #[test]
    fn test_capture_requires_active_session() {
        let h = harness();
        assert!(matches!(
            h.flow.capture_for_enrollment(),
            Err(AdminError::NoActiveSession)
        ));
        assert!(!h.flow.has_pending_capture());
    }

    #[test]
    fn test_capture_failure_on_live_session_is_a_device_error() {
        let display = Arc::new(KioskDisplay::new());
        let device = CaptureDevice::new(
            "admin",
            BrokenSensor { open: false },
            CaptureConfig::with_dimensions(8, 6),
        );
        let flow = AdminEnrollmentFlow::new(device, MockService::new(), display.clone());
        flow.enter().unwrap();

        let result = flow.capture_for_enrollment();

        assert!(matches!(
            result,
            Err(AdminError::Device(CameraError::CaptureFailed(_)))
        ));
        assert!(flow.device().is_running());
        assert!(!flow.has_pending_capture());
        assert!(display.snapshot().modal.is_some());
    }

    #[test]
    fn test_capture_replaces_pending_frame() {
        let h = harness();
        h.flow.enter().unwrap();

        h.flow.capture_for_enrollment().unwrap();
        let first = h.flow.pending_capture().unwrap().sequence();
        h.flow.capture_for_enrollment().unwrap();
        let second = h.flow.pending_capture().unwrap().sequence();

        assert!(second > first);
    }

    #[tokio::test]
    async fn test_submit_without_capture_never_contacts_service() {
        let h = harness();
        h.flow.enter().unwrap();

        let result = h.flow.submit(ana()).await;

        assert!(matches!(result, Err(AdminError::MissingCapture)));
        assert_eq!(h.service.add_user_calls(), 0);
    }

    #[tokio::test]
    async fn test_submit_rejects_blank_fields() {
        let h = harness();
        h.flow.enter().unwrap();
        h.flow.capture_for_enrollment().unwrap();

        let result = h.flow.submit(EnrollmentFields::new("  ", 30, "Engineer")).await;

        assert!(matches!(result, Err(AdminError::Validation(_))));
        assert_eq!(h.service.add_user_calls(), 0);
        assert!(h.flow.has_pending_capture());
    }

    #[tokio::test]
    async fn test_successful_submit_clears_and_stops() {
        let h = harness();
        h.flow.enter().unwrap();
        h.flow.capture_for_enrollment().unwrap();

        let receipt = h.flow.submit(ana()).await.unwrap();

        assert!(receipt.success);
        assert!(!h.flow.has_pending_capture());
        assert!(!h.flow.device().is_running());
        assert_eq!(h.camera.closes(), 1);

        let sent = h.service.last_enrollment.lock().unwrap().clone().unwrap();
        assert_eq!(sent.name, "Ana");
        assert_eq!(sent.age, 30);
        assert_eq!(sent.profession, "Engineer");
        assert_eq!(h.display.snapshot().modal.unwrap().title, "Success");
    }

    #[tokio::test]
    async fn test_failed_submit_can_be_retried() {
        let h = harness();
        h.flow.enter().unwrap();
        h.flow.capture_for_enrollment().unwrap();
        h.service.push_enrollment(Err(ServiceError::Network("timeout".to_string())));
        h.service.push_enrollment(Ok(EnrollmentReceipt {
            success: false,
            error: Some("No face detected in the image".to_string()),
            ..EnrollmentReceipt::default()
        }));

        assert!(matches!(
            h.flow.submit(ana()).await,
            Err(AdminError::Service(ServiceError::Network(_)))
        ));
        assert!(h.flow.has_pending_capture());
        assert!(h.flow.device().is_running());

        match h.flow.submit(ana()).await {
            Err(AdminError::Rejected(message)) => {
                assert_eq!(message, "No face detected in the image")
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(h.flow.has_pending_capture());

        assert!(h.flow.submit(ana()).await.is_ok());
        assert_eq!(h.service.add_user_calls(), 3);
        assert_eq!(h.flow.enrolled_count(), 1);
        assert!(!h.flow.has_pending_capture());
    }

    #[tokio::test]
    async fn test_success_for_superseded_session_keeps_new_session() {
        let h = harness();
        h.flow.enter().unwrap();
        h.flow.capture_for_enrollment().unwrap();
        let gate = h.service.gate_enrollment();

        let submit = h.flow.submit(ana());
        let reenter = async {
            while h.service.add_user_calls() == 0 {
                tokio::task::yield_now().await;
            }
            h.flow.cancel();
            h.flow.enter().unwrap();
            gate.notify_one();
        };
        let (result, ()) = tokio::join!(submit, reenter);

        assert!(result.is_ok());
        assert!(h.flow.device().is_running());
        assert_eq!(h.camera.opens(), 2);
        assert_eq!(h.camera.closes(), 1);
    }

    #[test]
    fn test_cancel_discards_pending_and_stops() {
        let h = harness();
        h.flow.enter().unwrap();
        h.flow.capture_for_enrollment().unwrap();

        h.flow.cancel();

        assert!(!h.flow.has_pending_capture());
        assert!(!h.flow.device().is_running());
        h.flow.cancel();
        assert_eq!(h.camera.closes(), 1);
    }
}
