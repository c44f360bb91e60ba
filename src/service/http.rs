//! HTTP client for the recognition service.
//!
//! Every call is a JSON request/response pair under `base_url`. Frames
//! travel as data URLs in an `{"image": ...}` body. A non-success status
//! is reported through the payload's `error` field.

use super::{
    DeleteReceipt, Detection, EnrollmentReceipt, EnrollmentRequest, FaceBox, HealthStatus,
    LogEntry, RecognitionResult, RemoteService, ServiceError, UserRecord,
};
use crate::capture::{EncodedImage, Frame};
use crate::config::ServiceConfig;
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Recognition service reached over HTTP.
pub struct HttpRemoteService {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

#[derive(Serialize)]
struct ImageBody {
    image: String,
}

#[derive(Serialize)]
struct AddUserBody<'a> {
    name: &'a str,
    age: u32,
    profession: &'a str,
    image: String,
}

#[derive(Deserialize)]
struct DetectBody {
    faces_detected: u32,
    #[serde(default)]
    faces: Vec<FaceBox>,
    #[serde(default)]
    annotated_image: Option<String>,
}

#[derive(Deserialize)]
struct RecognizeBody {
    recognized: bool,
    #[serde(default)]
    user: Option<UserRecord>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    annotated_image: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Deserialize)]
struct UsersBody {
    #[serde(default)]
    users: Vec<UserRecord>,
}

#[derive(Deserialize)]
struct LogsBody {
    #[serde(default)]
    logs: Vec<LogEntry>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

impl HttpRemoteService {
    /// Creates a client from the service configuration.
    pub fn new(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.clone(),
        })
    }

    /// Sets the bearer token used for administrative calls.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request<T, B>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
        requires_auth: bool,
    ) -> Result<T, ServiceError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%method, %url, "Service request");

        let mut builder = self.client.request(method, &url);
        if requires_auth {
            if let Some(token) = &self.auth_token {
                builder = builder.bearer_auth(token);
            }
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ServiceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| format!("HTTP error: {}", status.as_u16()));
            tracing::warn!(%url, status = status.as_u16(), %message, "Service reported failure");
            return Err(ServiceError::Service {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::Decode(e.to_string()))
    }
}

fn decode_annotated(image: Option<String>) -> Result<Option<EncodedImage>, ServiceError> {
    image
        .filter(|s| !s.is_empty())
        .map(|s| EncodedImage::from_data_url(&s))
        .transpose()
        .map_err(|e| ServiceError::Decode(e.to_string()))
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    async fn check_health(&self) -> Result<HealthStatus, ServiceError> {
        self.request::<_, ()>(Method::GET, "/health", None, false)
            .await
    }

    async fn detect(&self, frame: &Frame) -> Result<Detection, ServiceError> {
        let body = ImageBody {
            image: frame.to_data_url(),
        };
        let reply: DetectBody = self.request(Method::POST, "/detect", Some(&body), false).await?;

        Ok(Detection {
            faces_detected: reply.faces_detected,
            faces: reply.faces,
            annotated_frame: decode_annotated(reply.annotated_image)?,
        })
    }

    async fn recognize(&self, frame: &Frame) -> Result<RecognitionResult, ServiceError> {
        let body = ImageBody {
            image: frame.to_data_url(),
        };
        let reply: RecognizeBody = self
            .request(Method::POST, "/recognize", Some(&body), false)
            .await?;

        Ok(RecognitionResult {
            recognized: reply.recognized,
            identity: reply.user,
            confidence: reply.confidence,
            annotated_frame: decode_annotated(reply.annotated_image)?,
            message: reply.message,
        })
    }

    async fn add_user(&self, request: &EnrollmentRequest) -> Result<EnrollmentReceipt, ServiceError> {
        let body = AddUserBody {
            name: &request.name,
            age: request.age,
            profession: &request.profession,
            image: request.frame.to_data_url(),
        };
        self.request(Method::POST, "/users", Some(&body), false).await
    }

    async fn get_users(&self) -> Result<Vec<UserRecord>, ServiceError> {
        let reply: UsersBody = self
            .request::<_, ()>(Method::GET, "/users", None, true)
            .await?;
        Ok(reply.users)
    }

    async fn delete_user(&self, user_id: &str) -> Result<DeleteReceipt, ServiceError> {
        self.request::<_, ()>(Method::DELETE, &format!("/users/{user_id}"), None, true)
            .await
    }

    async fn get_logs(&self, limit: usize) -> Result<Vec<LogEntry>, ServiceError> {
        let reply: LogsBody = self
            .request::<_, ()>(Method::GET, &format!("/logs?limit={limit}"), None, true)
            .await?;
        Ok(reply.logs)
    }
}
