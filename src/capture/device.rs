//! Capture device lifecycle.
//!
//! A [`CaptureDevice`] owns exactly one [`Camera`] and at most one live
//! [`DeviceSession`] on it. Frames are only produced while a session is
//! active and are always mirrored before encoding.
//!
//! ```text
//! Idle --start ok--> Active --stop--> Idle
//! Idle --start err-> Idle   (error returned to caller)
//! Active: orthogonal AutoCapturing flag (start/stop_auto_capture)
//! ```

use super::{encode, mirror_horizontal, Camera, CameraError, CaptureConfig, Frame};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// One acquired capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceSession {
    generation: u64,
    width: u32,
    height: u32,
    started_at: Instant,
}

impl DeviceSession {
    /// Identifies this session; increases on every successful `start()`.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Frame width adopted from the hardware.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height adopted from the hardware.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

struct DeviceState {
    camera: Box<dyn Camera>,
    session: Option<DeviceSession>,
    generations: u64,
    sequence: u64,
}

struct Shared {
    name: String,
    config: CaptureConfig,
    state: Mutex<DeviceState>,
    auto_capture: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn auto_capture(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.auto_capture.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        if let Some(handle) = self.auto_capture().take() {
            handle.abort();
        }
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if state.session.take().is_some() {
            state.camera.close();
            tracing::debug!(device = %self.name, "Released camera on drop");
        }
    }
}

/// Handle to a capture device. Clones refer to the same device.
#[derive(Clone)]
pub struct CaptureDevice {
    shared: Arc<Shared>,
}

impl CaptureDevice {
    /// Wraps `camera` in a device named `name` (used in logs).
    pub fn new(name: impl Into<String>, camera: impl Camera + 'static, config: CaptureConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                name: name.into(),
                config,
                state: Mutex::new(DeviceState {
                    camera: Box::new(camera),
                    session: None,
                    generations: 0,
                    sequence: 0,
                }),
                auto_capture: Mutex::new(None),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.shared.config
    }

    /// Acquires the camera and opens a new session.
    ///
    /// Calling `start()` while a session is active is a no-op that returns
    /// the existing session; the hardware is not reacquired.
    pub fn start(&self) -> Result<DeviceSession, CameraError> {
        let mut state = self.shared.state();
        if let Some(session) = state.session {
            tracing::debug!(device = %self.shared.name, "Start ignored, session already active");
            return Ok(session);
        }

        self.shared
            .config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let resolution = match state.camera.open(&self.shared.config) {
            Ok(resolution) => resolution,
            Err(e) => {
                tracing::warn!(device = %self.shared.name, error = %e, "Camera acquisition failed");
                return Err(e);
            }
        };

        state.generations += 1;
        let session = DeviceSession {
            generation: state.generations,
            width: resolution.width,
            height: resolution.height,
            started_at: Instant::now(),
        };
        state.session = Some(session);

        tracing::info!(
            device = %self.shared.name,
            generation = session.generation,
            width = session.width,
            height = session.height,
            "Capture session started"
        );
        Ok(session)
    }

    /// Releases the camera and ends the session.
    ///
    /// Returns `true` if a session was torn down. Stopping an inactive
    /// device has no effect.
    pub fn stop(&self) -> bool {
        self.stop_auto_capture();

        let mut state = self.shared.state();
        match state.session.take() {
            Some(session) => {
                state.camera.close();
                tracing::info!(
                    device = %self.shared.name,
                    generation = session.generation,
                    "Capture session stopped"
                );
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.state().session.is_some()
    }

    /// The live session, if any.
    pub fn session(&self) -> Option<DeviceSession> {
        self.shared.state().session
    }

    /// Generation of the live session, if any.
    pub fn current_generation(&self) -> Option<u64> {
        self.session().map(|s| s.generation)
    }

    /// Samples the camera, mirrors the image and encodes it.
    ///
    /// Returns `None` when no session is active. Hardware or encoder
    /// failures are logged and also yield `None`.
    pub fn capture_frame(&self) -> Option<Frame> {
        let (raw, sequence, generation) = {
            let mut state = self.shared.state();
            let generation = state.session?.generation;
            let raw = match state.camera.capture() {
                Ok(raw) => raw,
                Err(e) => {
                    tracing::warn!(device = %self.shared.name, error = %e, "Frame capture failed");
                    return None;
                }
            };
            state.sequence += 1;
            (raw, state.sequence, generation)
        };

        let (width, height) = (raw.width(), raw.height());
        let config = &self.shared.config;
        match encode(mirror_horizontal(&raw), config.encoding, config.jpeg_quality) {
            Ok(image) => {
                tracing::trace!(device = %self.shared.name, sequence, "Frame captured");
                Some(Frame::new(image, width, height, sequence, generation))
            }
            Err(e) => {
                tracing::warn!(device = %self.shared.name, error = %e, "Frame encoding failed");
                None
            }
        }
    }

    /// Starts a repeating capture every `interval`, passing each frame to `on_frame`.
    ///
    /// The first frame is taken one full interval after the call. Does
    /// nothing (and returns `false`) when the device is not running, a
    /// timer is already installed, `interval` is zero, or no tokio runtime
    /// is available.
    pub fn start_auto_capture<F>(&self, interval: Duration, mut on_frame: F) -> bool
    where
        F: FnMut(Frame) + Send + 'static,
    {
        if !self.is_running() || interval.is_zero() {
            return false;
        }

        let mut slot = self.shared.auto_capture();
        if slot.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                tracing::warn!(device = %self.shared.name, "Auto-capture needs a tokio runtime");
                return false;
            }
        };

        let device: Weak<Shared> = Arc::downgrade(&self.shared);
        let handle = runtime.spawn(async move {
            let mut ticker =
                tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(shared) = device.upgrade() else {
                    break;
                };
                let frame = CaptureDevice { shared }.capture_frame();
                if let Some(frame) = frame {
                    on_frame(frame);
                }
            }
        });

        *slot = Some(handle);
        tracing::info!(
            device = %self.shared.name,
            interval_ms = interval.as_millis() as u64,
            "Auto-capture started"
        );
        true
    }

    /// Cancels the auto-capture timer. Idempotent.
    pub fn stop_auto_capture(&self) -> bool {
        match self.shared.auto_capture().take() {
            Some(handle) => {
                handle.abort();
                tracing::info!(device = %self.shared.name, "Auto-capture stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_auto_capturing(&self) -> bool {
        self.shared
            .auto_capture()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl std::fmt::Debug for CaptureDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureDevice")
            .field("name", &self.shared.name)
            .field("session", &self.session())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ImageFormat, MockCamera};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn png_config() -> CaptureConfig {
        CaptureConfig {
            encoding: ImageFormat::Png,
            ..CaptureConfig::with_dimensions(16, 8)
        }
    }

    #[test]
    fn test_start_stop_lifecycle() {
        let camera = MockCamera::new();
        let stats = camera.stats();
        let device = CaptureDevice::new("test", camera, CaptureConfig::default());

        assert!(!device.is_running());
        let session = device.start().unwrap();
        assert_eq!(session.generation(), 1);
        assert!(device.is_running());

        assert!(device.stop());
        assert!(!device.is_running());
        assert_eq!(stats.opens(), 1);
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_start_while_active_does_not_reacquire() {
        let camera = MockCamera::new();
        let stats = camera.stats();
        let device = CaptureDevice::new("test", camera, CaptureConfig::default());

        let first = device.start().unwrap();
        let second = device.start().unwrap();
        assert_eq!(first, second);
        assert_eq!(stats.opens(), 1);
    }

    #[test]
    fn test_generation_increases_per_session() {
        let device = CaptureDevice::new("test", MockCamera::new(), CaptureConfig::default());
        assert_eq!(device.start().unwrap().generation(), 1);
        device.stop();
        assert_eq!(device.current_generation(), None);
        assert_eq!(device.start().unwrap().generation(), 2);
    }

    #[test]
    fn test_start_failure_leaves_device_idle() {
        let device = CaptureDevice::new("test", MockCamera::unavailable(), CaptureConfig::default());
        assert!(matches!(
            device.start(),
            Err(CameraError::DeviceUnavailable(_))
        ));
        assert!(!device.is_running());
        assert!(device.capture_frame().is_none());
    }

    #[test]
    fn test_session_adopts_hardware_resolution() {
        let device = CaptureDevice::new(
            "test",
            MockCamera::with_native_resolution(32, 24),
            CaptureConfig::default(),
        );
        let session = device.start().unwrap();
        assert_eq!((session.width(), session.height()), (32, 24));

        let frame = device.capture_frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (32, 24));
    }

    #[test]
    fn test_captured_frame_is_mirrored() {
        let device = CaptureDevice::new("test", MockCamera::new(), png_config());
        device.start().unwrap();

        let frame = device.capture_frame().unwrap();
        assert_eq!(frame.generation(), 1);
        let decoded = image::load_from_memory(frame.image().bytes()).unwrap().to_rgb8();
        let width = decoded.width();

        for y in 0..decoded.height() {
            for x in 0..width {
                let expected = MockCamera::sensor_pixel(width - 1 - x, y, frame.sequence());
                assert_eq!(decoded.get_pixel(x, y).0, expected, "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_stop_releases_camera_once() {
        let camera = MockCamera::new();
        let stats = camera.stats();
        let device = CaptureDevice::new("test", camera, CaptureConfig::default());
        device.start().unwrap();

        assert!(device.stop());
        assert!(!device.stop());
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_dropping_active_device_releases_camera() {
        let camera = MockCamera::new();
        let stats = camera.stats();
        {
            let device = CaptureDevice::new("test", camera, CaptureConfig::default());
            device.start().unwrap();
        }
        assert_eq!(stats.closes(), 1);
    }

    #[test]
    fn test_auto_capture_requires_active_device() {
        let device = CaptureDevice::new("test", MockCamera::new(), CaptureConfig::default());
        assert!(!device.start_auto_capture(Duration::from_millis(10), |_| {}));
        assert!(!device.is_auto_capturing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_capture_fires_once_per_interval() {
        let device = CaptureDevice::new("test", MockCamera::new(), CaptureConfig::with_dimensions(4, 4));
        device.start().unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        assert!(device.start_auto_capture(Duration::from_millis(1000), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(device.is_auto_capturing());

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        assert!(device.stop_auto_capture());
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(device.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_auto_capture_timer_per_device() {
        let device = CaptureDevice::new("test", MockCamera::new(), CaptureConfig::with_dimensions(4, 4));
        device.start().unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&count);
        let second = Arc::clone(&count);
        assert!(device.start_auto_capture(Duration::from_millis(100), move |_| {
            first.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(!device.start_auto_capture(Duration::from_millis(100), move |_| {
            second.fetch_add(1, Ordering::SeqCst);
        }));

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_auto_capture() {
        let device = CaptureDevice::new("test", MockCamera::new(), CaptureConfig::with_dimensions(4, 4));
        device.start().unwrap();

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        device.start_auto_capture(Duration::from_millis(100), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        device.stop();
        assert!(!device.is_auto_capturing());
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Start,
        Stop,
        Capture,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Start), Just(Op::Stop), Just(Op::Capture)]
    }

    proptest! {
        #[test]
        fn stop_on_inactive_device_is_noop(stops in 1usize..20) {
            let camera = MockCamera::new();
            let stats = camera.stats();
            let device = CaptureDevice::new("prop", camera, CaptureConfig::with_dimensions(4, 4));

            for _ in 0..stops {
                prop_assert!(!device.stop());
            }
            prop_assert_eq!(stats.closes(), 0);
            prop_assert!(!device.is_running());
        }

        #[test]
        fn capture_is_none_whenever_not_running(ops in proptest::collection::vec(op(), 0..30)) {
            let device = CaptureDevice::new("prop", MockCamera::new(), CaptureConfig::with_dimensions(4, 4));

            for op in ops {
                match op {
                    Op::Start => { device.start().unwrap(); }
                    Op::Stop => { device.stop(); }
                    Op::Capture => {
                        let frame = device.capture_frame();
                        prop_assert_eq!(frame.is_some(), device.is_running());
                    }
                }
            }
            if !device.is_running() {
                prop_assert!(device.capture_frame().is_none());
            }
        }
    }
}
