//! Health, readiness, metrics, fallback and CORS tests.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;
use sign_test_utils::{TestSignServer, TestTokenBuilder, TEST_ISSUER};

#[tokio::test]
async fn test_health_reports_issuer() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    let response = reqwest::get(format!("{}/health", server.url())).await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["issuer"], TEST_ISSUER);
    // Liveness never touches the identity provider
    assert_eq!(server.jwks_fetches().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_ready_fetches_key_set_once() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "ready");
    assert_eq!(body["key_set"], "available");
    assert!(body.get("error").is_none());

    // Populated snapshot: no further fetch
    let response = reqwest::get(format!("{}/ready", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(server.jwks_fetches().await, 1);

    Ok(())
}

#[tokio::test]
async fn test_ready_returns_503_without_key_set() -> Result<()> {
    let server = TestSignServer::builder().key_set_unavailable().spawn().await?;

    let response = reqwest::get(format!("{}/ready", server.url())).await?;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json().await?;
    assert_eq!(body["status"], "not_ready");
    assert_eq!(body["key_set"], "unavailable");
    assert_eq!(body["error"], "Service dependencies unavailable");

    Ok(())
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_request_metrics() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let token = TestTokenBuilder::new().sign(server.signing_key());

    reqwest::Client::new()
        .get(format!("{}/api/v1/me", server.url()))
        .bearer_auth(token)
        .send()
        .await?;

    let response = reqwest::get(format!("{}/metrics", server.url())).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await?;
    assert!(body.contains("sign_http_requests_total"));
    assert!(body.contains("sign_token_verifications_total"));
    // Tokens and identities never appear in labels
    assert!(!body.contains("test-subject"));

    Ok(())
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    let response = reqwest::get(format!("{}/api/v1/unknown", server.url())).await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Not Found");
    assert_eq!(body["status"], 404);

    Ok(())
}

#[tokio::test]
async fn test_wrong_method_returns_json_405() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    let response = reqwest::Client::new()
        .post(format!("{}/health", server.url()))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "Method Not Allowed");
    assert_eq!(body["status"], 405);

    Ok(())
}

#[tokio::test]
async fn test_preflight_allows_any_origin_by_default() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    let response = reqwest::Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/api/v1/text-to-sign", server.url()),
        )
        .header("Origin", "https://app.example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "authorization,content-type")
        .send()
        .await?;

    // Answered before authentication
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    assert!(response
        .headers()
        .get("access-control-allow-credentials")
        .is_none());
    assert_eq!(server.jwks_fetches().await, 0);

    Ok(())
}

#[tokio::test]
async fn test_cors_allow_list() -> Result<()> {
    let server = TestSignServer::builder()
        .var("CORS_ORIGINS", "https://app.example.com, http://localhost:3000")
        .spawn()
        .await?;
    let client = reqwest::Client::new();

    let allowed = client
        .get(format!("{}/health", server.url()))
        .header("Origin", "http://localhost:3000")
        .send()
        .await?;
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(
        allowed.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
    let exposed = allowed
        .headers()
        .get("access-control-expose-headers")
        .unwrap()
        .to_str()?
        .to_ascii_lowercase();
    assert!(exposed.contains("content-type"));
    assert!(exposed.contains("authorization"));

    let denied = client
        .get(format!("{}/health", server.url()))
        .header("Origin", "https://evil.example.com")
        .send()
        .await?;
    assert_eq!(denied.status(), StatusCode::OK);
    assert!(denied.headers().get("access-control-allow-origin").is_none());

    Ok(())
}
