//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, verifies it, and
//! injects the resulting
//! [`IdentityClaims`](crate::auth::claims::IdentityClaims) into request
//! extensions.

use crate::auth::jwt::{AuthFailure, TokenVerifier};
use crate::errors::SignError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<TokenVerifier>,
}

/// Pull the credential out of an `Authorization: Bearer <token>` value.
///
/// The scheme is matched case-insensitively.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Reject the request with 401 unless it carries a valid identity token.
#[instrument(skip(state, req, next), name = "sign.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, SignError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| {
            tracing::debug!(target: "sign.middleware.auth", "Missing or malformed Authorization header");
            AuthFailure::MissingCredential
        })?;

    let claims = state.verifier.verify(token).await?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
