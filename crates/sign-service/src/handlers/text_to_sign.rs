//! Text-to-sign handler.

use crate::errors::SignError;
use crate::models::{TextToSignRequest, TextToSignResponse};
use crate::routes::AppState;
use axum::{extract::State, Json};
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /api/v1/text-to-sign
///
/// Resolves the text into an ordered list of playable clips. A missing body,
/// an unparsable body, or blank text all yield `{"videos": []}`.
///
/// ## Response
///
/// ```json
/// { "videos": [ { "token": "قلب", "url": "https://...", "key": "videos/ar/قلب.mp4" } ] }
/// ```
///
/// ## Errors
///
/// - 401: missing or invalid identity token (auth middleware)
/// - 503: content store failure or timeout
/// - 500: link issuance failure
#[instrument(skip_all, name = "sign.handlers.text_to_sign")]
pub async fn text_to_sign(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TextToSignRequest>>,
) -> Result<Json<TextToSignResponse>, SignError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let text = request.text.unwrap_or_default();

    let videos = state.pipeline.resolve(&text).await?;

    tracing::debug!(target: "sign.handlers.text_to_sign", clips = videos.len(), "Resolved text");

    Ok(Json(TextToSignResponse { videos }))
}
