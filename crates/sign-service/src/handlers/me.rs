//! Current user handler.

use crate::auth::claims::IdentityClaims;
use crate::models::MeResponse;
use axum::{Extension, Json};
use tracing::instrument;

/// Handler for GET /api/v1/me
///
/// Projects the verified identity into a profile. Requires the auth
/// middleware.
///
/// ```json
/// { "sub": "9f1c...", "name": "Layla", "email": "layla@example.com", "gender": null }
/// ```
#[instrument(skip_all, name = "sign.handlers.me")]
pub async fn get_me(Extension(identity): Extension<IdentityClaims>) -> Json<MeResponse> {
    tracing::debug!(target: "sign.handlers.me", "Returning caller profile");

    Json(MeResponse {
        sub: identity.sub,
        name: identity.name,
        email: identity.email,
        gender: identity.gender,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_me_projects_identity() {
        let identity = IdentityClaims {
            sub: "user-1".to_string(),
            name: "Layla".to_string(),
            email: Some("layla@example.com".to_string()),
            gender: None,
            token_use: "id".to_string(),
            exp: 1_900_000_000,
        };

        let Json(me) = get_me(Extension(identity)).await;

        assert_eq!(me.sub, "user-1");
        assert_eq!(me.name, "Layla");
        assert_eq!(me.email.as_deref(), Some("layla@example.com"));
        assert!(me.gender.is_none());
    }
}
