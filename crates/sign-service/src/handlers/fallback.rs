//! Responses for requests the router itself rejects.
//!
//! Unknown paths, method mismatches and timed-out requests get the same
//! `{"error", "status"}` body as handler errors.

use crate::errors::SignError;
use axum::http::{Method, Uri};
use axum::BoxError;

/// Fallback for paths with no route.
pub async fn not_found(uri: Uri) -> SignError {
    tracing::debug!(target: "sign.handlers.fallback", path = %uri.path(), "No route");
    SignError::NotFound("Not Found".to_string())
}

/// Fallback for a known path requested with an unsupported method.
pub async fn method_not_allowed(method: Method, uri: Uri) -> SignError {
    tracing::debug!(
        target: "sign.handlers.fallback",
        method = %method,
        path = %uri.path(),
        "Method not allowed"
    );
    SignError::MethodNotAllowed("Method Not Allowed".to_string())
}

/// Maps errors from the request timeout layer.
pub async fn handle_timeout_error(err: BoxError) -> SignError {
    if err.is::<tower::timeout::error::Elapsed>() {
        SignError::RequestTimeout(err.to_string())
    } else {
        SignError::Internal(format!("Unhandled middleware error: {}", err))
    }
}
