//! Native webcam backend built on `nokhwa`.
//!
//! The nokhwa handle is not `Send`, so it lives on a dedicated thread and
//! the [`Camera`] methods talk to it over channels.

use super::{Camera, CameraError, CaptureConfig, RawImage, Resolution};
use crossbeam_channel::{Receiver, Sender};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
    Resolution as NokhwaResolution,
};
use std::thread::{self, JoinHandle};

const TARGET_FPS: u32 = 30;

enum Request {
    Capture(Sender<Result<RawImage, CameraError>>),
    Close,
}

struct Worker {
    requests: Sender<Request>,
    handle: JoinHandle<()>,
    resolution: Resolution,
}

/// A physical camera opened through the platform's native capture API.
#[derive(Default)]
pub struct NokhwaCamera {
    worker: Option<Worker>,
}

impl NokhwaCamera {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Camera for NokhwaCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<Resolution, CameraError> {
        if let Some(worker) = &self.worker {
            return Ok(worker.resolution);
        }
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;

        let (requests, request_rx) = crossbeam_channel::unbounded();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
        let worker_config = config.clone();

        let handle = thread::Builder::new()
            .name(format!("camera-{}", config.device_id))
            .spawn(move || run_worker(&worker_config, request_rx, ready_tx))
            .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(resolution)) => {
                tracing::info!(device = config.device_id, ?resolution, "Native camera opened");
                self.worker = Some(Worker {
                    requests,
                    handle,
                    resolution,
                });
                Ok(resolution)
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(CameraError::DeviceUnavailable(
                    "camera thread exited during acquisition".to_string(),
                ))
            }
        }
    }

    fn capture(&mut self) -> Result<RawImage, CameraError> {
        let worker = self.worker.as_ref().ok_or(CameraError::NoActiveSession)?;
        let (reply_tx, reply_rx) = crossbeam_channel::bounded(1);

        worker
            .requests
            .send(Request::Capture(reply_tx))
            .map_err(|_| CameraError::CaptureFailed("camera thread stopped".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| CameraError::CaptureFailed("camera thread stopped".to_string()))?
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.requests.send(Request::Close);
            if worker.handle.join().is_err() {
                tracing::warn!("Camera thread panicked during shutdown");
            }
            tracing::info!("Native camera closed");
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.close();
    }
}

fn run_worker(
    config: &CaptureConfig,
    requests: Receiver<Request>,
    ready: Sender<Result<Resolution, CameraError>>,
) {
    let mut camera = match open_device(config) {
        Ok(camera) => camera,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let actual = camera.resolution();
    let _ = ready.send(Ok(Resolution::new(actual.width(), actual.height())));

    for request in requests {
        match request {
            Request::Capture(reply) => {
                let _ = reply.send(read_frame(&mut camera));
            }
            Request::Close => break,
        }
    }

    if let Err(e) = camera.stop_stream() {
        tracing::warn!(error = %e, "Failed to stop camera stream");
    }
}

fn open_device(config: &CaptureConfig) -> Result<nokhwa::Camera, CameraError> {
    // Native backends expose no facing selection; the preference stays advisory.
    tracing::debug!(facing = ?config.facing, "Facing preference not supported by native backend");

    let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
        NokhwaResolution::new(config.ideal_width, config.ideal_height),
        FrameFormat::MJPEG,
        TARGET_FPS,
    )));

    let mut camera = nokhwa::Camera::new(CameraIndex::Index(config.device_id), format)
        .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;
    camera
        .open_stream()
        .map_err(|e| CameraError::DeviceUnavailable(e.to_string()))?;
    Ok(camera)
}

fn read_frame(camera: &mut nokhwa::Camera) -> Result<RawImage, CameraError> {
    let buffer = camera
        .frame()
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;
    let decoded = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| CameraError::CaptureFailed(e.to_string()))?;

    let (width, height) = (decoded.width(), decoded.height());
    Ok(RawImage::new(decoded.into_raw(), width, height))
}
