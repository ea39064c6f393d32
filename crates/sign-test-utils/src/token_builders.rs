//! Builder for identity tokens
//!
//! Defaults produce a token the [`crate::TestSignServer`] accepts: issuer
//! [`TEST_ISSUER`], audience [`TEST_CLIENT_ID`], `token_use` "id", and one
//! hour of validity.

use crate::crypto_fixtures::TestSigningKey;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Header};
use serde_json::{json, Map, Value};

/// Issuer the test server is configured with.
pub const TEST_ISSUER: &str = "https://idp.test/pool-1";

/// App client id the test server is configured with.
pub const TEST_CLIENT_ID: &str = "test-client-id";

/// Builder for identity token claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_user("user-1")
///     .with_name("Layla")
///     .expires_in(60)
///     .sign(&key);
/// ```
pub struct TestTokenBuilder {
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_CLIENT_ID));
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("token_use".to_string(), json!("id"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { claims }
    }

    /// Set the subject
    pub fn for_user(self, subject: &str) -> Self {
        self.claim("sub", json!(subject))
    }

    pub fn with_name(self, name: &str) -> Self {
        self.claim("name", json!(name))
    }

    pub fn with_given_name(self, given_name: &str) -> Self {
        self.claim("given_name", json!(given_name))
    }

    /// Provider-specific username claim.
    pub fn with_username(self, username: &str) -> Self {
        self.claim("cognito:username", json!(username))
    }

    pub fn with_email(self, email: &str) -> Self {
        self.claim("email", json!(email))
    }

    pub fn with_gender(self, gender: &str) -> Self {
        self.claim("gender", json!(gender))
    }

    pub fn with_issuer(self, issuer: &str) -> Self {
        self.claim("iss", json!(issuer))
    }

    pub fn with_audience(self, audience: &str) -> Self {
        self.claim("aud", json!(audience))
    }

    pub fn with_token_use(self, token_use: &str) -> Self {
        self.claim("token_use", json!(token_use))
    }

    /// Set expiration in seconds from now (negative for an expired token)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.claim("exp", json!(exp))
    }

    /// Set an arbitrary claim
    pub fn claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    /// Remove a claim
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Build the claims as a JSON value
    pub fn build(self) -> Value {
        Value::Object(self.claims)
    }

    /// Sign with `key`, setting `alg` and `kid` in the header.
    pub fn sign(self, key: &TestSigningKey) -> String {
        let mut header = Header::new(key.algorithm());
        header.kid = Some(key.kid().to_string());
        self.sign_with_header(key, header)
    }

    /// Sign with `key` under an explicit header.
    pub fn sign_with_header(self, key: &TestSigningKey, header: Header) -> String {
        encode(&header, &self.build(), key.encoding_key()).expect("test token should encode")
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
