//! Sign recognition service client.
//!
//! Forwards an uploaded sign video to the external prediction service as a
//! multipart form (field `video`) and returns the recognized text. The model
//! behind the service is not part of this crate.
//!
//! # Errors
//!
//! - Unreachable service, timeout, or 5xx: `SignError::ServiceUnavailable`
//! - 400 from the service: `SignError::BadRequest`
//! - Unparsable response or other statuses: `SignError::Internal`

use crate::errors::SignError;
use axum::body::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, instrument, warn};

/// A video as received from the client.
#[derive(Debug, Clone)]
pub struct VideoUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: Option<String>,
}

/// Result returned by the prediction service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub text: String,

    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Trait for recognition operations (enables mocking).
#[async_trait::async_trait]
pub trait RecognitionService: Send + Sync {
    async fn recognize(&self, video: VideoUpload) -> Result<Recognition, SignError>;
}

/// HTTP client for the prediction service.
#[derive(Clone)]
pub struct RecognitionClient {
    client: Client,
    url: String,
}

impl RecognitionClient {
    /// Create a new recognition client.
    ///
    /// # Arguments
    ///
    /// * `url` - Prediction endpoint (e.g., "http://localhost:6000/predict")
    /// * `timeout` - Upper bound for one prediction
    ///
    /// # Errors
    ///
    /// Returns `SignError::Internal` if the HTTP client cannot be built.
    pub fn new(url: String, timeout: Duration) -> Result<Self, SignError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| {
                error!(target: "sign.services.recognition", error = %e, "Failed to build HTTP client");
                SignError::Internal(format!("recognition client: {e}"))
            })?;

        Ok(Self { client, url })
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Recognition, SignError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| {
                error!(target: "sign.services.recognition", error = %e, "Failed to parse recognition response");
                SignError::Internal("malformed recognition response".to_string())
            })
        } else if status.is_server_error() {
            warn!(target: "sign.services.recognition", status = %status, "Recognition service returned server error");
            Err(SignError::ServiceUnavailable(
                "Recognition service is unavailable".to_string(),
            ))
        } else if status.as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            warn!(target: "sign.services.recognition", body = %body, "Recognition service rejected the video");
            Err(SignError::BadRequest(
                "Video could not be processed".to_string(),
            ))
        } else {
            warn!(target: "sign.services.recognition", status = %status, "Unexpected recognition response");
            Err(SignError::Internal(format!(
                "recognition service returned HTTP {status}"
            )))
        }
    }
}

#[async_trait::async_trait]
impl RecognitionService for RecognitionClient {
    #[instrument(skip(self, video), fields(file_name = %video.file_name, size = video.bytes.len()))]
    async fn recognize(&self, video: VideoUpload) -> Result<Recognition, SignError> {
        let length = video.bytes.len() as u64;
        let mut part = Part::stream_with_length(video.bytes, length).file_name(video.file_name);
        if let Some(content_type) = video.content_type.as_deref() {
            part = part.mime_str(content_type).map_err(|e| {
                SignError::BadRequest(format!("Invalid video content type: {e}"))
            })?;
        }
        let form = Form::new().part("video", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!(target: "sign.services.recognition", error = %e, "Recognition request failed");
                SignError::ServiceUnavailable("Recognition service is unavailable".to_string())
            })?;

        self.handle_response(response).await
    }
}

/// Mock recognition service for testing.
pub mod mock {

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Mock recognition service.
    pub struct MockRecognition {
        result: Option<Recognition>,
        call_count: AtomicUsize,
        last_file_name: Mutex<Option<String>>,
    }

    impl MockRecognition {
        /// Create a mock that always returns `text`.
        pub fn returning(text: &str, confidence: Option<f64>) -> Self {
            Self {
                result: Some(Recognition {
                    text: text.to_string(),
                    confidence,
                }),
                call_count: AtomicUsize::new(0),
                last_file_name: Mutex::new(None),
            }
        }

        /// Create a mock whose service is down.
        pub fn unavailable() -> Self {
            Self {
                result: None,
                call_count: AtomicUsize::new(0),
                last_file_name: Mutex::new(None),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn last_file_name(&self) -> Option<String> {
            self.last_file_name
                .lock()
                .ok()
                .and_then(|name| name.clone())
        }
    }

    #[async_trait::async_trait]
    impl RecognitionService for MockRecognition {
        async fn recognize(&self, video: VideoUpload) -> Result<Recognition, SignError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut name) = self.last_file_name.lock() {
                *name = Some(video.file_name);
            }
            self.result.clone().ok_or_else(|| {
                SignError::ServiceUnavailable("Recognition service is unavailable".to_string())
            })
        }
    }
}
