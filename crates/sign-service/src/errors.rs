//! Sign service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Every
//! error body has the shape `{"error": message, "status": code}`. Store and
//! upstream failures return a generic message to clients; the actual cause
//! is logged server-side.

use crate::auth::jwt::AuthFailure;
use crate::content::links::LinkError;
use crate::content::store::StoreError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// `WWW-Authenticate` challenge sent with every 401.
pub const WWW_AUTHENTICATE_CHALLENGE: &str =
    "Bearer realm=\"sign-service\", error=\"invalid_token\"";

/// Sign service error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 Unauthorized
/// - BadRequest: 400 Bad Request
/// - NotFound: 404 Not Found
/// - MethodNotAllowed: 405 Method Not Allowed
/// - RequestTimeout: 408 Request Timeout
/// - PayloadTooLarge: 413 Payload Too Large
/// - StoreUnavailable, ServiceUnavailable: 503 Service Unavailable
/// - Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum SignError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Content store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SignError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            SignError::Unauthorized(_) => 401,
            SignError::BadRequest(_) => 400,
            SignError::NotFound(_) => 404,
            SignError::MethodNotAllowed(_) => 405,
            SignError::RequestTimeout(_) => 408,
            SignError::PayloadTooLarge(_) => 413,
            SignError::StoreUnavailable(_) | SignError::ServiceUnavailable(_) => 503,
            SignError::Internal(_) => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for SignError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            SignError::Unauthorized(reason) => (StatusCode::UNAUTHORIZED, reason.clone()),
            SignError::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
            SignError::NotFound(reason) => (StatusCode::NOT_FOUND, reason.clone()),
            SignError::MethodNotAllowed(reason) => {
                (StatusCode::METHOD_NOT_ALLOWED, reason.clone())
            }
            SignError::RequestTimeout(reason) => {
                tracing::warn!(target: "sign.availability", reason = %reason, "Request timed out");
                (StatusCode::REQUEST_TIMEOUT, "Request timed out".to_string())
            }
            SignError::PayloadTooLarge(reason) => (StatusCode::PAYLOAD_TOO_LARGE, reason.clone()),
            SignError::StoreUnavailable(cause) => {
                tracing::error!(target: "sign.content", cause = %cause, "Content store check failed");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Content store temporarily unavailable".to_string(),
                )
            }
            SignError::ServiceUnavailable(reason) => {
                tracing::warn!(target: "sign.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Service temporarily unavailable".to_string(),
                )
            }
            SignError::Internal(cause) => {
                tracing::error!(target: "sign.internal", cause = %cause, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: message,
            status: status.as_u16(),
        };

        let mut response = (status, Json(body)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                HeaderValue::from_static(WWW_AUTHENTICATE_CHALLENGE),
            );
        }

        response
    }
}

impl From<AuthFailure> for SignError {
    fn from(failure: AuthFailure) -> Self {
        SignError::Unauthorized(failure.to_string())
    }
}

impl From<StoreError> for SignError {
    fn from(err: StoreError) -> Self {
        SignError::StoreUnavailable(err.to_string())
    }
}

impl From<LinkError> for SignError {
    fn from(err: LinkError) -> Self {
        SignError::Internal(err.to_string())
    }
}
