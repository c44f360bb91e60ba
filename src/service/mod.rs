//! Remote recognition service.
//!
//! The service owns detection, recognition and identity storage. This
//! module defines the contract the kiosk relies on and an HTTP client
//! for it; everything stateful stays on the kiosk side.

mod http;
mod types;

pub use http::HttpRemoteService;
pub use types::{
    DeleteReceipt, Detection, EnrollmentReceipt, EnrollmentRequest, FaceBox, HealthStatus,
    LogEntry, RecognitionResult, UserRecord,
};

use crate::capture::Frame;
use async_trait::async_trait;
use thiserror::Error;

/// Default number of log entries requested by the admin log view.
pub const DEFAULT_LOG_LIMIT: usize = 100;

/// Errors that can occur while talking to the service.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    /// The request was rejected or never reached the service.
    #[error("network failure: {0}")]
    Network(String),
    /// The service answered but reported a failure.
    #[error("{message}")]
    Service { status: u16, message: String },
    /// The response did not have the expected shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

/// Contract of the recognition service.
///
/// `detect`, `recognize` and `add_user` need no credentials; the
/// administrative listing operations require a bearer token.
#[async_trait]
pub trait RemoteService: Send + Sync {
    async fn check_health(&self) -> Result<HealthStatus, ServiceError>;

    async fn detect(&self, frame: &Frame) -> Result<Detection, ServiceError>;

    async fn recognize(&self, frame: &Frame) -> Result<RecognitionResult, ServiceError>;

    async fn add_user(&self, request: &EnrollmentRequest) -> Result<EnrollmentReceipt, ServiceError>;

    async fn get_users(&self) -> Result<Vec<UserRecord>, ServiceError>;

    async fn delete_user(&self, user_id: &str) -> Result<DeleteReceipt, ServiceError>;

    async fn get_logs(&self, limit: usize) -> Result<Vec<LogEntry>, ServiceError>;
}
