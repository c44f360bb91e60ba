//! Request and result types exchanged with the recognition service.

use crate::capture::{EncodedImage, Frame};
use serde::{Deserialize, Serialize};

/// Service liveness as reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl HealthStatus {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}

/// A face bounding box in frame coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

/// Outcome of a detection call.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub faces_detected: u32,
    pub faces: Vec<FaceBox>,
    pub annotated_frame: Option<EncodedImage>,
}

/// An identity record held by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub profession: Option<String>,
}

/// Outcome of a recognition call. Consumed once by the presenter.
#[derive(Debug, Clone, Default)]
pub struct RecognitionResult {
    pub recognized: bool,
    pub identity: Option<UserRecord>,
    /// Match confidence in `[0, 100]`.
    pub confidence: Option<f64>,
    pub annotated_frame: Option<EncodedImage>,
    pub message: Option<String>,
}

/// A validated enrollment ready to be sent.
#[derive(Debug, Clone)]
pub struct EnrollmentRequest {
    pub name: String,
    pub age: u32,
    pub profession: String,
    pub frame: Frame,
}

/// Service reply to an enrollment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentReceipt {
    pub success: bool,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Service reply to a deletion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteReceipt {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// One access-log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub action: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}
