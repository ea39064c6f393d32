//! Authentication integration tests.
//!
//! Identity tokens are minted with the fixture keys and verified by a real
//! server against a wiremock key-set endpoint.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used)]

use anyhow::Result;
use jsonwebtoken::{Algorithm, Header};
use reqwest::StatusCode;
use sign_service::errors::WWW_AUTHENTICATE_CHALLENGE;
use sign_test_utils::{TestSignServer, TestSigningKey, TestTokenBuilder};

async fn get_me(server: &TestSignServer, token: Option<&str>) -> Result<reqwest::Response> {
    let mut request = reqwest::Client::new().get(format!("{}/api/v1/me", server.url()));
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    Ok(request.send().await?)
}

/// Assert the uniform 401 shape and return the error message.
async fn assert_unauthorized(response: reqwest::Response) -> Result<String> {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok()),
        Some(WWW_AUTHENTICATE_CHALLENGE)
    );

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["status"], 401);
    Ok(body["error"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_rs256_identity_token_accepted() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .for_user("user-rsa")
        .with_name("Layla")
        .with_email("layla@example.com")
        .with_gender("female")
        .sign(server.signing_key());

    let response = get_me(&server, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["sub"], "user-rsa");
    assert_eq!(body["name"], "Layla");
    assert_eq!(body["email"], "layla@example.com");
    assert_eq!(body["gender"], "female");

    Ok(())
}

#[tokio::test]
async fn test_eddsa_identity_token_accepted() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .for_user("user-ed")
        .with_username("omar01")
        .sign(server.ed25519_key());

    let response = get_me(&server, Some(&token)).await?;
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await?;
    assert_eq!(body["sub"], "user-ed");
    // Falls back to the provider username when no name is present
    assert_eq!(body["name"], "omar01");
    assert!(body["email"].is_null());

    Ok(())
}

#[tokio::test]
async fn test_missing_authorization_header() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    let message = assert_unauthorized(get_me(&server, None).await?).await?;
    assert_eq!(message, "Missing Authorization Bearer token");

    Ok(())
}

#[tokio::test]
async fn test_non_bearer_scheme_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    let response = reqwest::Client::new()
        .get(format!("{}/api/v1/me", server.url()))
        .header("Authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;

    let message = assert_unauthorized(response).await?;
    assert_eq!(message, "Missing Authorization Bearer token");

    Ok(())
}

#[tokio::test]
async fn test_access_token_rejected_when_identity_expected() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .with_token_use("access")
        .sign(server.signing_key());

    let message = assert_unauthorized(get_me(&server, Some(&token)).await?).await?;
    assert!(message.contains("token_use"), "unexpected message: {message}");

    Ok(())
}

#[tokio::test]
async fn test_expired_token_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .expires_in(-120)
        .sign(server.signing_key());

    let message = assert_unauthorized(get_me(&server, Some(&token)).await?).await?;
    assert_eq!(message, "Token has expired");

    Ok(())
}

#[tokio::test]
async fn test_wrong_issuer_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .with_issuer("https://idp.test/other-pool")
        .sign(server.signing_key());

    let message = assert_unauthorized(get_me(&server, Some(&token)).await?).await?;
    assert_eq!(message, "Invalid token issuer");

    Ok(())
}

#[tokio::test]
async fn test_wrong_audience_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let token = TestTokenBuilder::new()
        .with_audience("some-other-client")
        .sign(server.signing_key());

    let message = assert_unauthorized(get_me(&server, Some(&token)).await?).await?;
    assert_eq!(message, "Invalid token audience");

    Ok(())
}

#[tokio::test]
async fn test_token_from_unpublished_key_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let rogue = TestSigningKey::ed25519("rogue-key", 42)?;
    let token = TestTokenBuilder::new().sign(&rogue);

    assert_unauthorized(get_me(&server, Some(&token)).await?).await?;

    Ok(())
}

#[tokio::test]
async fn test_token_signed_by_other_key_under_published_kid_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    // Same kid as the published EdDSA key, different private key
    let impostor = TestSigningKey::ed25519(server.ed25519_key().kid(), 99)?;
    let token = TestTokenBuilder::new().sign(&impostor);

    assert_unauthorized(get_me(&server, Some(&token)).await?).await?;

    Ok(())
}

#[tokio::test]
async fn test_algorithm_not_matching_key_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let mut header = Header::new(Algorithm::RS384);
    header.kid = Some(server.signing_key().kid().to_string());
    // RS384 signature with the RS256-announced key
    let token = TestTokenBuilder::new().sign_with_header(server.signing_key(), header);

    assert_unauthorized(get_me(&server, Some(&token)).await?).await?;

    Ok(())
}

#[tokio::test]
async fn test_token_without_kid_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let header = Header::new(Algorithm::RS256);
    let token = TestTokenBuilder::new().sign_with_header(server.signing_key(), header);

    assert_unauthorized(get_me(&server, Some(&token)).await?).await?;

    Ok(())
}

#[tokio::test]
async fn test_garbage_token_rejected() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    assert_unauthorized(get_me(&server, Some("not-a-jwt")).await?).await?;

    Ok(())
}

#[tokio::test]
async fn test_key_set_unavailable_rejects_with_401() -> Result<()> {
    let server = TestSignServer::builder().key_set_unavailable().spawn().await?;
    let token = TestTokenBuilder::new().sign(server.signing_key());

    assert_unauthorized(get_me(&server, Some(&token)).await?).await?;

    Ok(())
}

#[tokio::test]
async fn test_key_set_is_cached_across_requests() -> Result<()> {
    let server = TestSignServer::spawn().await?;
    let token = TestTokenBuilder::new().sign(server.signing_key());

    for _ in 0..3 {
        let response = get_me(&server, Some(&token)).await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(server.jwks_fetches().await, 1);

    Ok(())
}

#[tokio::test]
async fn test_unknown_kid_triggers_single_refresh() -> Result<()> {
    let server = TestSignServer::spawn().await?;

    // Populate the cache
    let token = TestTokenBuilder::new().sign(server.signing_key());
    assert_eq!(get_me(&server, Some(&token)).await?.status(), StatusCode::OK);
    assert_eq!(server.jwks_fetches().await, 1);

    let rogue = TestSigningKey::rsa("rotated-key")?;
    let token = TestTokenBuilder::new().sign(&rogue);
    assert_unauthorized(get_me(&server, Some(&token)).await?).await?;

    assert_eq!(server.jwks_fetches().await, 2);

    Ok(())
}
