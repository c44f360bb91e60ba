//! Single-flight recognition workflow.
//!
//! One trigger captures a frame, asks the service to detect faces and,
//! if any were found, to recognize them. At most one trigger runs at a
//! time; triggers arriving meanwhile are dropped, not queued.

use super::{RecognitionStats, TriggerOutcome, WorkflowState};
use crate::capture::{CameraError, CaptureDevice, DeviceSession, Frame};
use crate::config::RecognitionConfig;
use crate::presentation::{IdentityView, Presenter, StatusLevel};
use crate::service::{RecognitionResult, RemoteService, ServiceError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Holds the in-flight flag for the lifetime of one trigger.
///
/// Released on drop, so every exit path (including a cancelled future)
/// frees the flag.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Drives capture → detect → recognize for the normal-mode device.
pub struct RecognitionOrchestrator {
    device: CaptureDevice,
    service: Arc<dyn RemoteService>,
    presenter: Arc<dyn Presenter>,
    config: RecognitionConfig,
    in_flight: AtomicBool,
    state: Mutex<WorkflowState>,
    stats: Mutex<RecognitionStats>,
}

impl RecognitionOrchestrator {
    pub fn new(
        device: CaptureDevice,
        service: Arc<dyn RemoteService>,
        presenter: Arc<dyn Presenter>,
        config: RecognitionConfig,
    ) -> Self {
        Self {
            device,
            service,
            presenter,
            config,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(WorkflowState::Idle),
            stats: Mutex::new(RecognitionStats::default()),
        }
    }

    pub fn device(&self) -> &CaptureDevice {
        &self.device
    }

    pub fn state(&self) -> WorkflowState {
        *lock(&self.state)
    }

    pub fn stats(&self) -> RecognitionStats {
        *lock(&self.stats)
    }

    /// True while a trigger holds the single-flight guard.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    fn set_state(&self, state: WorkflowState) {
        let mut current = lock(&self.state);
        if *current != state {
            tracing::trace!(from = %*current, to = %state, "Workflow transition");
            *current = state;
        }
    }

    /// State to fall back to once a trigger is over.
    fn rest(&self) {
        let state = if self.device.is_running() {
            WorkflowState::DeviceActive
        } else {
            WorkflowState::Idle
        };
        self.set_state(state);
    }

    /// Checks that the service is reachable and reports readiness.
    pub async fn check_service(&self) -> bool {
        match self.service.check_health().await {
            Ok(health) => {
                tracing::info!(status = %health.status, "Recognition service reachable");
                self.presenter
                    .update_status("Ready. Start the camera to begin.", StatusLevel::Info);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Recognition service unreachable");
                self.presenter.update_status(
                    "Error: unable to reach the recognition service. Check that the server is running.",
                    StatusLevel::Error,
                );
                self.presenter.show_modal(
                    "Connection error",
                    &format!("Unable to reach the recognition service: {e}"),
                );
                false
            }
        }
    }

    /// Starts the recognition camera.
    pub fn start_device(&self) -> Result<DeviceSession, CameraError> {
        self.set_state(WorkflowState::DeviceStarting);
        match self.device.start() {
            Ok(session) => {
                self.set_state(WorkflowState::DeviceActive);
                self.presenter.set_camera_active(true);
                self.presenter.update_status(
                    "Camera active. Place your face in front of the camera.",
                    StatusLevel::Info,
                );
                Ok(session)
            }
            Err(e) => {
                self.set_state(WorkflowState::Idle);
                self.presenter.update_status(
                    "Error: unable to access the camera. Check permissions.",
                    StatusLevel::Error,
                );
                self.presenter.show_modal(
                    "Error",
                    "Unable to access the camera. Make sure permission was granted and no other application is using it.",
                );
                Err(e)
            }
        }
    }

    /// Stops the recognition camera. Returns `false` if it was not running.
    pub fn stop_device(&self) -> bool {
        let stopped = self.device.stop();
        if stopped {
            self.set_state(WorkflowState::Idle);
            self.presenter.set_camera_active(false);
            self.presenter.update_status("Camera stopped.", StatusLevel::Info);
        }
        stopped
    }

    /// Start/stop control: stops a live device, starts an idle one.
    ///
    /// Returns whether the device is running afterwards.
    pub fn toggle_device(&self) -> Result<bool, CameraError> {
        match self.device.session() {
            Some(_) => {
                self.stop_device();
                Ok(false)
            }
            None => self.start_device().map(|_| true),
        }
    }

    /// Captures a frame and runs it through detection and recognition.
    ///
    /// Returns [`TriggerOutcome::Busy`] immediately if another trigger is
    /// in flight.
    pub async fn trigger_recognition(&self) -> TriggerOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!("Recognition already in flight, trigger dropped");
            return self.record(TriggerOutcome::Busy);
        };

        let outcome = match self.device.capture_frame() {
            Some(frame) => self.run(frame).await,
            None => {
                self.presenter
                    .update_status("Error: unable to capture image.", StatusLevel::Error);
                self.rest();
                TriggerOutcome::CaptureFailed
            }
        };
        self.record(outcome)
    }

    /// Runs an already captured frame (e.g. from auto-capture) through
    /// the same single-flight workflow.
    pub async fn submit_frame(&self, frame: Frame) -> TriggerOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            tracing::debug!(sequence = frame.sequence(), "Recognition already in flight, frame dropped");
            return self.record(TriggerOutcome::Busy);
        };

        let outcome = self.run(frame).await;
        self.record(outcome)
    }

    fn record(&self, outcome: TriggerOutcome) -> TriggerOutcome {
        lock(&self.stats).record(outcome);
        outcome
    }

    async fn run(&self, frame: Frame) -> TriggerOutcome {
        self.presenter
            .update_status("Image captured. Analyzing...", StatusLevel::Info);
        self.set_state(WorkflowState::Detecting);

        let detection = match self.service.detect(&frame).await {
            Ok(detection) => detection,
            Err(e) => return self.fail(&frame, e),
        };
        if !self.is_current(&frame) {
            return self.discard(&frame);
        }

        if detection.faces_detected == 0 {
            self.presenter.update_status(
                "No face detected. Please position yourself in front of the camera.",
                StatusLevel::Warning,
            );
            self.presenter.reset_identity();
            self.rest();
            return TriggerOutcome::NoFace;
        }

        self.presenter.update_status(
            &format!(
                "{} face(s) detected. Recognizing...",
                detection.faces_detected
            ),
            StatusLevel::Info,
        );
        self.set_state(WorkflowState::Recognizing);

        let result = match self.service.recognize(&frame).await {
            Ok(result) => result,
            Err(e) => return self.fail(&frame, e),
        };
        if !self.is_current(&frame) {
            return self.discard(&frame);
        }

        self.apply(result)
    }

    fn apply(&self, result: RecognitionResult) -> TriggerOutcome {
        let RecognitionResult {
            recognized,
            identity,
            confidence,
            annotated_frame,
            ..
        } = result;

        match (recognized, identity) {
            (true, Some(user)) => {
                tracing::info!(name = %user.name, ?confidence, "User recognized");
                self.presenter.show_identity(IdentityView::recognized(
                    &user,
                    confidence,
                    annotated_frame,
                ));
                self.presenter.update_status(
                    &format!("Recognized user: {}", user.name),
                    StatusLevel::Success,
                );
                self.set_state(WorkflowState::Displaying);
                TriggerOutcome::Recognized
            }
            _ => {
                self.presenter.reset_identity();
                self.presenter
                    .update_status("Face not recognized.", StatusLevel::Warning);
                match annotated_frame {
                    Some(photo) => {
                        self.presenter.show_identity(IdentityView::unknown(photo));
                        self.set_state(WorkflowState::Displaying);
                    }
                    None => self.rest(),
                }
                TriggerOutcome::NotRecognized
            }
        }
    }

    fn fail(&self, frame: &Frame, error: ServiceError) -> TriggerOutcome {
        if !self.is_current(frame) {
            return self.discard(frame);
        }
        tracing::warn!(error = %error, "Recognition request failed");
        self.presenter
            .update_status(&format!("Error: {error}"), StatusLevel::Error);
        self.presenter.reset_identity();
        self.set_state(WorkflowState::Error);
        TriggerOutcome::Failed
    }

    /// Whether a result for `frame` may still be applied.
    fn is_current(&self, frame: &Frame) -> bool {
        !self.config.discard_stale_results
            || self.device.current_generation() == Some(frame.generation())
    }

    fn discard(&self, frame: &Frame) -> TriggerOutcome {
        tracing::debug!(
            frame_generation = frame.generation(),
            current_generation = ?self.device.current_generation(),
            "Result from a superseded session discarded"
        );
        self.rest();
        TriggerOutcome::Discarded
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, EncodedImage, ImageFormat, MockCamera};
    use crate::presentation::KioskDisplay;
    use crate::service::mock::MockService;
    use crate::service::UserRecord;

    struct Harness {
        orchestrator: Arc<RecognitionOrchestrator>,
        service: Arc<MockService>,
        display: Arc<KioskDisplay>,
    }

    fn harness_with(camera: MockCamera, config: RecognitionConfig) -> Harness {
        let service = MockService::new();
        let display = Arc::new(KioskDisplay::new());
        let device = CaptureDevice::new("normal", camera, CaptureConfig::with_dimensions(8, 8));
        let orchestrator = Arc::new(RecognitionOrchestrator::new(
            device,
            service.clone(),
            display.clone(),
            config,
        ));
        Harness {
            orchestrator,
            service,
            display,
        }
    }

    fn harness() -> Harness {
        harness_with(MockCamera::new(), RecognitionConfig::default())
    }

    fn ana() -> RecognitionResult {
        RecognitionResult {
            recognized: true,
            identity: Some(UserRecord {
                user_id: Some("u1".to_string()),
                name: "Ana".to_string(),
                age: Some(30),
                profession: Some("Engineer".to_string()),
            }),
            confidence: Some(92.5),
            ..RecognitionResult::default()
        }
    }

    fn status_text(display: &KioskDisplay) -> String {
        display.snapshot().status.map(|s| s.text).unwrap_or_default()
    }

    async fn wait_until(condition: impl Fn() -> bool) {
        while !condition() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_inactive_device_reports_capture_failure() {
        let h = harness();

        let outcome = h.orchestrator.trigger_recognition().await;

        assert_eq!(outcome, TriggerOutcome::CaptureFailed);
        assert_eq!(h.orchestrator.state(), WorkflowState::Idle);
        assert_eq!(h.service.total_calls(), 0);
        assert_eq!(status_text(&h.display), "Error: unable to capture image.");
        assert!(!h.orchestrator.is_in_flight());
    }

    #[tokio::test]
    async fn test_no_face_skips_recognition() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        h.service.push_detection(0);

        let outcome = h.orchestrator.trigger_recognition().await;

        assert_eq!(outcome, TriggerOutcome::NoFace);
        assert_eq!(h.service.recognize_calls(), 0);
        let snapshot = h.display.snapshot();
        assert!(snapshot.identity.is_none());
        let status = snapshot.status.unwrap();
        assert!(status.text.starts_with("No face detected"));
        assert_eq!(status.level, StatusLevel::Warning);
        assert_eq!(h.orchestrator.state(), WorkflowState::DeviceActive);
    }

    #[tokio::test]
    async fn test_recognized_user_is_displayed() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        h.service.push_detection(2);
        h.service.push_recognition(ana());

        let outcome = h.orchestrator.trigger_recognition().await;

        assert_eq!(outcome, TriggerOutcome::Recognized);
        assert_eq!(h.service.detect_calls(), 1);
        assert_eq!(h.service.recognize_calls(), 1);
        let snapshot = h.display.snapshot();
        let identity = snapshot.identity.unwrap();
        assert_eq!(identity.name, "Ana");
        assert_eq!(identity.age, "30");
        assert_eq!(identity.profession, "Engineer");
        assert_eq!(identity.confidence, "92.50%");
        assert_eq!(snapshot.status.unwrap().level, StatusLevel::Success);
        assert_eq!(h.orchestrator.state(), WorkflowState::Displaying);
    }

    #[tokio::test]
    async fn test_unrecognized_face_shows_annotated_frame() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        h.service.push_detection(1);
        h.service.push_recognition(RecognitionResult {
            recognized: false,
            annotated_frame: Some(EncodedImage::new(ImageFormat::Jpeg, vec![1, 2, 3])),
            ..RecognitionResult::default()
        });

        let outcome = h.orchestrator.trigger_recognition().await;

        assert_eq!(outcome, TriggerOutcome::NotRecognized);
        let identity = h.display.snapshot().identity.unwrap();
        assert_eq!(identity.name, "Unknown");
        assert_eq!(identity.age, "-");
        assert_eq!(identity.confidence, "-");
        assert!(identity.photo.is_some());
        assert_eq!(status_text(&h.display), "Face not recognized.");
    }

    #[tokio::test]
    async fn test_unrecognized_without_annotation_resets_display() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        h.service.push_detection(1);
        h.service.push_recognition(ana());
        h.orchestrator.trigger_recognition().await;

        h.service.push_detection(1);
        h.service.push_recognition(RecognitionResult::default());
        let outcome = h.orchestrator.trigger_recognition().await;

        assert_eq!(outcome, TriggerOutcome::NotRecognized);
        assert!(h.display.snapshot().identity.is_none());
        assert_eq!(h.orchestrator.state(), WorkflowState::DeviceActive);
    }

    #[tokio::test]
    async fn test_service_failure_keeps_orchestrator_usable() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        h.service
            .push_detection_error(ServiceError::Network("connection refused".to_string()));

        let outcome = h.orchestrator.trigger_recognition().await;

        assert_eq!(outcome, TriggerOutcome::Failed);
        assert_eq!(h.orchestrator.state(), WorkflowState::Error);
        assert!(!h.orchestrator.is_in_flight());
        let status = h.display.snapshot().status.unwrap();
        assert_eq!(status.text, "Error: network failure: connection refused");
        assert_eq!(status.level, StatusLevel::Error);

        h.service.push_detection(0);
        assert_eq!(
            h.orchestrator.trigger_recognition().await,
            TriggerOutcome::NoFace
        );
    }

    #[tokio::test]
    async fn test_recognition_error_resets_identity() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        h.service.push_detection(1);
        h.service.push_recognition(ana());
        h.orchestrator.trigger_recognition().await;

        h.service.push_detection(1);
        h.service.push_recognition_error(ServiceError::Service {
            status: 500,
            message: "internal".to_string(),
        });
        let outcome = h.orchestrator.trigger_recognition().await;

        assert_eq!(outcome, TriggerOutcome::Failed);
        assert!(h.display.snapshot().identity.is_none());
        assert_eq!(status_text(&h.display), "Error: internal");
    }

    #[tokio::test]
    async fn test_burst_of_triggers_runs_single_flight() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        let gate = h.service.gate_detect();
        h.service.push_detection(0);

        let orchestrator = Arc::clone(&h.orchestrator);
        let first = tokio::spawn(async move { orchestrator.trigger_recognition().await });
        let service = Arc::clone(&h.service);
        wait_until(|| service.detect_calls() == 1).await;
        assert!(h.orchestrator.is_in_flight());
        assert_eq!(h.orchestrator.state(), WorkflowState::Detecting);

        for _ in 0..5 {
            assert_eq!(
                h.orchestrator.trigger_recognition().await,
                TriggerOutcome::Busy
            );
        }
        assert_eq!(h.service.detect_calls(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), TriggerOutcome::NoFace);
        assert!(!h.orchestrator.is_in_flight());

        let stats = h.orchestrator.stats();
        assert_eq!(stats.dropped, 5);
        assert_eq!(stats.attempts, 1);
    }

    #[tokio::test]
    async fn test_submitted_frames_share_the_guard() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        let gate = h.service.gate_detect();
        let frame = h.orchestrator.device().capture_frame().unwrap();

        let orchestrator = Arc::clone(&h.orchestrator);
        let running = tokio::spawn(async move { orchestrator.trigger_recognition().await });
        let service = Arc::clone(&h.service);
        wait_until(|| service.detect_calls() == 1).await;

        assert_eq!(
            h.orchestrator.submit_frame(frame).await,
            TriggerOutcome::Busy
        );
        gate.notify_one();
        running.await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_result_discarded_after_restart() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        h.service.push_detection(1);
        h.service.push_recognition(ana());
        let gate = h.service.gate_recognize();

        let orchestrator = Arc::clone(&h.orchestrator);
        let pending = tokio::spawn(async move { orchestrator.trigger_recognition().await });
        let service = Arc::clone(&h.service);
        wait_until(|| service.recognize_calls() == 1).await;

        h.orchestrator.stop_device();
        h.orchestrator.start_device().unwrap();
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), TriggerOutcome::Discarded);
        assert!(h.display.snapshot().identity.is_none());
        assert_eq!(h.orchestrator.state(), WorkflowState::DeviceActive);
        assert_eq!(h.orchestrator.stats().discarded, 1);
    }

    #[tokio::test]
    async fn test_stale_result_applied_when_gating_disabled() {
        let h = harness_with(
            MockCamera::new(),
            RecognitionConfig {
                discard_stale_results: false,
            },
        );
        h.orchestrator.start_device().unwrap();
        h.service.push_detection(1);
        h.service.push_recognition(ana());
        let gate = h.service.gate_recognize();

        let orchestrator = Arc::clone(&h.orchestrator);
        let pending = tokio::spawn(async move { orchestrator.trigger_recognition().await });
        let service = Arc::clone(&h.service);
        wait_until(|| service.recognize_calls() == 1).await;

        h.orchestrator.stop_device();
        h.orchestrator.start_device().unwrap();
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), TriggerOutcome::Recognized);
        assert_eq!(h.display.snapshot().identity.unwrap().name, "Ana");
    }

    #[tokio::test]
    async fn test_stop_during_flight_does_not_abort_call() {
        let h = harness();
        h.orchestrator.start_device().unwrap();
        h.service.push_detection(1);
        let gate = h.service.gate_detect();

        let orchestrator = Arc::clone(&h.orchestrator);
        let pending = tokio::spawn(async move { orchestrator.trigger_recognition().await });
        let service = Arc::clone(&h.service);
        wait_until(|| service.detect_calls() == 1).await;

        h.orchestrator.stop_device();
        gate.notify_one();

        assert_eq!(pending.await.unwrap(), TriggerOutcome::Discarded);
        assert_eq!(h.service.recognize_calls(), 0);
        assert_eq!(h.orchestrator.state(), WorkflowState::Idle);
    }

    #[test]
    fn test_toggle_dispatches_on_device_state() {
        let h = harness();

        assert!(h.orchestrator.toggle_device().unwrap());
        assert!(h.display.snapshot().camera_active);
        assert_eq!(h.orchestrator.state(), WorkflowState::DeviceActive);

        assert!(!h.orchestrator.toggle_device().unwrap());
        assert!(!h.display.snapshot().camera_active);
        assert_eq!(h.orchestrator.state(), WorkflowState::Idle);
        assert_eq!(status_text(&h.display), "Camera stopped.");
    }

    #[test]
    fn test_start_failure_is_reported() {
        let h = harness_with(MockCamera::unavailable(), RecognitionConfig::default());

        let result = h.orchestrator.toggle_device();

        assert!(matches!(result, Err(CameraError::DeviceUnavailable(_))));
        assert_eq!(h.orchestrator.state(), WorkflowState::Idle);
        let snapshot = h.display.snapshot();
        assert_eq!(snapshot.status.unwrap().level, StatusLevel::Error);
        assert!(snapshot.modal.is_some());
        assert!(!snapshot.camera_active);
    }

    #[tokio::test]
    async fn test_health_check_failure_is_not_fatal() {
        let h = harness();
        *h.service.health.lock().unwrap() =
            Some(Err(ServiceError::Network("refused".to_string())));

        assert!(!h.orchestrator.check_service().await);
        let snapshot = h.display.snapshot();
        assert_eq!(snapshot.modal.unwrap().title, "Connection error");

        *h.service.health.lock().unwrap() = None;
        assert!(h.orchestrator.check_service().await);
        assert_eq!(status_text(&h.display), "Ready. Start the camera to begin.");
    }
}
