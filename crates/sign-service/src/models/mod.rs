//! Request and response bodies for the HTTP API.

use crate::resolver::pipeline::ResolvedClip;
use serde::{Deserialize, Serialize};

/// Liveness response for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,

    /// Configured identity provider issuer.
    pub issuer: String,
}

/// Readiness response for `GET /ready`.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Key set status: "available" or "unavailable".
    pub key_set: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /api/v1/text-to-sign`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TextToSignRequest {
    #[serde(default)]
    pub text: Option<String>,
}

/// Response of `POST /api/v1/text-to-sign`.
#[derive(Debug, Clone, Serialize)]
pub struct TextToSignResponse {
    pub videos: Vec<ResolvedClip>,
}

/// Response of `GET /api/v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub sub: String,
    pub name: String,
    pub email: Option<String>,
    pub gender: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_text_to_sign_request_tolerates_missing_text() {
        let req: TextToSignRequest = serde_json::from_str("{}").unwrap();
        assert!(req.text.is_none());

        let req: TextToSignRequest = serde_json::from_str(r#"{"text":null}"#).unwrap();
        assert!(req.text.is_none());

        let req: TextToSignRequest = serde_json::from_str(r#"{"text":"قلب"}"#).unwrap();
        assert_eq!(req.text.as_deref(), Some("قلب"));
    }

    #[test]
    fn test_readiness_response_omits_empty_error() {
        let ready = ReadinessResponse {
            status: "ready",
            key_set: "available",
            error: None,
        };
        let json = serde_json::to_string(&ready).unwrap();
        assert_eq!(json, r#"{"status":"ready","key_set":"available"}"#);
    }

    #[test]
    fn test_me_response_keeps_null_fields() {
        let me = MeResponse {
            sub: "u1".to_string(),
            name: "Layla".to_string(),
            email: None,
            gender: None,
        };
        let json = serde_json::to_value(&me).unwrap();
        assert!(json.get("email").unwrap().is_null());
        assert!(json.get("gender").unwrap().is_null());
    }
}
