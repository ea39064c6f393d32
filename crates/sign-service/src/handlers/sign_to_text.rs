//! Sign-to-text handler.
//!
//! Accepts a multipart upload with a `video` field and forwards it to the
//! recognition service.

use crate::errors::SignError;
use crate::routes::AppState;
use crate::services::recognition::{Recognition, VideoUpload};
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Multipart field carrying the video.
pub const VIDEO_FIELD: &str = "video";

const DEFAULT_FILE_NAME: &str = "upload.mp4";

fn multipart_error(err: MultipartError) -> SignError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        SignError::PayloadTooLarge("Uploaded video exceeds the size limit".to_string())
    } else {
        SignError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

fn multipart_rejection(rejection: MultipartRejection) -> SignError {
    SignError::BadRequest(format!(
        "Expected a multipart/form-data body: {}",
        rejection.body_text()
    ))
}

/// Handler for POST /api/v1/sign-to-text
///
/// ## Response
///
/// ```json
/// { "text": "مرحبا", "confidence": 0.92 }
/// ```
///
/// ## Errors
///
/// - 400: body is not multipart, or has no `video` field
/// - 413: upload larger than `MAX_UPLOAD_BYTES`
/// - 503: recognition service unreachable or failing
#[instrument(skip_all, name = "sign.handlers.sign_to_text")]
pub async fn sign_to_text(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Recognition>, SignError> {
    let mut multipart = multipart.map_err(multipart_rejection)?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(VIDEO_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_FILE_NAME)
            .to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        if bytes.is_empty() {
            return Err(SignError::BadRequest("Video file is empty".to_string()));
        }

        tracing::debug!(
            target: "sign.handlers.sign_to_text",
            size = bytes.len(),
            "Forwarding video for recognition"
        );

        let recognition = state
            .recognition
            .recognize(VideoUpload {
                bytes,
                file_name,
                content_type,
            })
            .await?;

        return Ok(Json(recognition));
    }

    Err(SignError::BadRequest("No video file provided".to_string()))
}
