//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK with the configured issuer
//! - `/ready`: Readiness probe - the identity key set is usable

use crate::models::{HealthResponse, ReadinessResponse};
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does not touch any dependency; failure means the process is hung.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        issuer: state.config.idp_issuer.clone(),
    })
}

/// Readiness probe handler.
///
/// Ready when a key-set snapshot is held, or when one can be fetched now.
/// Returns 503 otherwise.
///
/// ## Security
///
/// The error message is generic. The fetch failure is logged server-side.
#[tracing::instrument(skip_all, name = "sign.health.readiness")]
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let key_set = state.verifier.key_set();

    if !key_set.is_populated().await {
        if let Err(e) = key_set.force_refresh().await {
            tracing::warn!(target: "sign.health", error = %e, "Readiness check failed: key set unavailable");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    key_set: "unavailable",
                    error: Some("Service dependencies unavailable".to_string()),
                }),
            );
        }
    }

    (
        StatusCode::OK,
        Json(ReadinessResponse {
            status: "ready",
            key_set: "available",
            error: None,
        }),
    )
}
