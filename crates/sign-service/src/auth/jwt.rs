//! Identity token verification.
//!
//! Tokens pass through a fixed sequence of gates; the first failing gate
//! rejects the token:
//!
//! 0. Size (before any decoding)
//! 1. Header with a non-empty `kid`
//! 2. Key lookup in the key-set cache
//! 3. Signature under the key's algorithm (RS256/384/512 or EdDSA)
//! 4. `iss` equals the configured issuer
//! 5. `aud` equals (or contains) the configured client id
//! 6. `exp` in the future, with bounded leeway
//! 7. `token_use` equals the expected purpose
//!
//! Every rejection is an [`AuthFailure`] and maps to HTTP 401.

use crate::auth::claims::{IdentityClaims, TokenClaims};
use crate::auth::jwks::{Jwk, KeySetCache};
use crate::observability::metrics::record_token_verification;
use common::jwt::{
    decode_ed25519_public_key_jwk, parse_header, validate_exp_at, JwtValidationError,
};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Why a credential was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("Missing Authorization Bearer token")]
    MissingCredential,

    #[error("Token exceeds maximum allowed size")]
    TokenTooLarge,

    #[error("Malformed token")]
    MalformedToken,

    #[error("Token header has no kid")]
    MissingKid,

    #[error("Signing keys unavailable")]
    KeySetUnavailable,

    #[error("Unknown signing key")]
    UnknownKey,

    #[error("Unsupported token algorithm")]
    UnsupportedAlgorithm,

    #[error("Token algorithm does not match signing key")]
    AlgorithmMismatch,

    #[error("Signing key is unusable")]
    InvalidKey,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid token issuer")]
    IssuerMismatch,

    #[error("Invalid token audience")]
    AudienceMismatch,

    #[error("Token has no expiry")]
    MissingExpiry,

    #[error("Token has expired")]
    Expired,

    #[error("Wrong token_use (expected '{expected}')")]
    WrongTokenUse { expected: String },
}

/// How far verification got before a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Start,
    HeaderParsed,
    KeyResolved,
    SignatureVerified,
    ClaimsChecked,
    PurposeChecked,
    Verified,
}

impl AuthFailure {
    /// Bounded label for metrics.
    pub fn code(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredential => "missing_credential",
            AuthFailure::TokenTooLarge => "token_too_large",
            AuthFailure::MalformedToken => "malformed",
            AuthFailure::MissingKid => "missing_kid",
            AuthFailure::KeySetUnavailable => "key_set_unavailable",
            AuthFailure::UnknownKey => "unknown_key",
            AuthFailure::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthFailure::AlgorithmMismatch => "algorithm_mismatch",
            AuthFailure::InvalidKey => "invalid_key",
            AuthFailure::InvalidSignature => "invalid_signature",
            AuthFailure::IssuerMismatch => "issuer_mismatch",
            AuthFailure::AudienceMismatch => "audience_mismatch",
            AuthFailure::MissingExpiry => "missing_expiry",
            AuthFailure::Expired => "expired",
            AuthFailure::WrongTokenUse { .. } => "wrong_token_use",
        }
    }

    /// The last stage passed before this rejection.
    pub fn stage(&self) -> VerificationStage {
        match self {
            AuthFailure::MissingCredential
            | AuthFailure::TokenTooLarge
            | AuthFailure::MalformedToken
            | AuthFailure::MissingKid => VerificationStage::Start,
            AuthFailure::KeySetUnavailable | AuthFailure::UnknownKey => {
                VerificationStage::HeaderParsed
            }
            AuthFailure::UnsupportedAlgorithm
            | AuthFailure::AlgorithmMismatch
            | AuthFailure::InvalidKey
            | AuthFailure::InvalidSignature => VerificationStage::KeyResolved,
            AuthFailure::IssuerMismatch
            | AuthFailure::AudienceMismatch
            | AuthFailure::MissingExpiry
            | AuthFailure::Expired => VerificationStage::SignatureVerified,
            AuthFailure::WrongTokenUse { .. } => VerificationStage::ClaimsChecked,
        }
    }
}

impl From<JwtValidationError> for AuthFailure {
    fn from(err: JwtValidationError) -> Self {
        match err {
            JwtValidationError::TokenTooLarge => AuthFailure::TokenTooLarge,
            JwtValidationError::MalformedToken => AuthFailure::MalformedToken,
            JwtValidationError::MissingKid => AuthFailure::MissingKid,
            JwtValidationError::MissingExpiry => AuthFailure::MissingExpiry,
            JwtValidationError::Expired => AuthFailure::Expired,
        }
    }
}

/// Verifies identity tokens against the provider's key set.
pub struct TokenVerifier {
    key_set: Arc<KeySetCache>,
    issuer: String,
    client_id: String,
    expected_token_use: String,
    leeway: Duration,
}

impl TokenVerifier {
    /// Create a verifier.
    ///
    /// # Arguments
    ///
    /// * `key_set` - Cache of the provider's signing keys
    /// * `issuer` - Exact expected `iss`
    /// * `client_id` - Expected `aud`
    /// * `expected_token_use` - Expected `token_use` purpose claim
    /// * `leeway` - Tolerance applied to `exp`
    pub fn new(
        key_set: Arc<KeySetCache>,
        issuer: String,
        client_id: String,
        expected_token_use: String,
        leeway: Duration,
    ) -> Self {
        Self {
            key_set,
            issuer,
            client_id,
            expected_token_use,
            leeway,
        }
    }

    pub fn key_set(&self) -> &Arc<KeySetCache> {
        &self.key_set
    }

    /// Verify a raw bearer token against the current wall clock.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthFailure`] of the first gate that rejected the token.
    pub async fn verify(&self, token: &str) -> Result<IdentityClaims, AuthFailure> {
        self.verify_at(token, chrono::Utc::now().timestamp()).await
    }

    /// Verify a raw bearer token as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the [`AuthFailure`] of the first gate that rejected the token.
    #[instrument(skip_all)]
    pub async fn verify_at(&self, token: &str, now: i64) -> Result<IdentityClaims, AuthFailure> {
        let result = self.run_gates(token, now).await;

        match &result {
            Ok(_) => {
                record_token_verification("verified");
                tracing::debug!(
                    target: "sign.auth.jwt",
                    stage = ?VerificationStage::Verified,
                    "Token verified"
                );
            }
            Err(failure) => {
                record_token_verification(failure.code());
                tracing::debug!(
                    target: "sign.auth.jwt",
                    reason = failure.code(),
                    stage = ?failure.stage(),
                    "Token rejected"
                );
            }
        }

        result
    }

    async fn run_gates(&self, token: &str, now: i64) -> Result<IdentityClaims, AuthFailure> {
        let header = parse_header(token)?;

        let jwk = self.key_set.get_key(&header.kid).await?;

        let claims = verify_signature(token, &header.alg, &jwk)?;

        if claims.iss.as_deref() != Some(self.issuer.as_str()) {
            return Err(AuthFailure::IssuerMismatch);
        }

        if !claims
            .aud
            .as_ref()
            .is_some_and(|aud| aud.contains(&self.client_id))
        {
            return Err(AuthFailure::AudienceMismatch);
        }

        validate_exp_at(claims.exp, self.leeway, now)?;
        let exp = claims.exp.ok_or(AuthFailure::MissingExpiry)?;

        let token_use = match claims.token_use.as_deref() {
            Some(token_use) if token_use == self.expected_token_use => token_use.to_string(),
            _ => {
                return Err(AuthFailure::WrongTokenUse {
                    expected: self.expected_token_use.clone(),
                })
            }
        };

        Ok(IdentityClaims::from_verified(claims, exp, token_use))
    }
}

/// Pick the verification algorithm for `header_alg` under `jwk`.
///
/// `none` and HMAC algorithms are never accepted. A key that declares an
/// `alg` only verifies tokens claiming that same `alg`.
fn select_algorithm(header_alg: &str, jwk: &Jwk) -> Result<Algorithm, AuthFailure> {
    let algorithm = match header_alg {
        "RS256" => Algorithm::RS256,
        "RS384" => Algorithm::RS384,
        "RS512" => Algorithm::RS512,
        "EdDSA" => Algorithm::EdDSA,
        _ => return Err(AuthFailure::UnsupportedAlgorithm),
    };

    if let Some(key_alg) = &jwk.alg {
        if key_alg != header_alg {
            tracing::warn!(
                target: "sign.auth.jwt",
                key_alg = %key_alg,
                header_alg = %header_alg,
                "Token algorithm differs from key algorithm"
            );
            return Err(AuthFailure::AlgorithmMismatch);
        }
    }

    let family_matches = match algorithm {
        Algorithm::EdDSA => jwk.kty == "OKP",
        _ => jwk.kty == "RSA",
    };
    if !family_matches {
        return Err(AuthFailure::AlgorithmMismatch);
    }

    Ok(algorithm)
}

fn decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthFailure> {
    match jwk.kty.as_str() {
        "RSA" => {
            let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
                tracing::error!(target: "sign.auth.jwt", kid = %jwk.kid, "RSA key missing n or e");
                return Err(AuthFailure::InvalidKey);
            };
            DecodingKey::from_rsa_components(n, e).map_err(|e| {
                tracing::error!(target: "sign.auth.jwt", error = %e, "Invalid RSA key components");
                AuthFailure::InvalidKey
            })
        }
        "OKP" => {
            if jwk.crv.as_deref().is_some_and(|crv| crv != "Ed25519") {
                return Err(AuthFailure::InvalidKey);
            }
            let x = jwk.x.as_deref().ok_or_else(|| {
                tracing::error!(target: "sign.auth.jwt", kid = %jwk.kid, "OKP key missing x");
                AuthFailure::InvalidKey
            })?;
            let public_key = decode_ed25519_public_key_jwk(x).map_err(|e| {
                tracing::error!(target: "sign.auth.jwt", error = %e, "Invalid public key encoding");
                AuthFailure::InvalidKey
            })?;
            Ok(DecodingKey::from_ed_der(&public_key))
        }
        other => {
            tracing::warn!(target: "sign.auth.jwt", kty = %other, "Unexpected JWK key type");
            Err(AuthFailure::InvalidKey)
        }
    }
}

/// Verify the signature and decode the payload.
///
/// Claim checks are left to the caller so that each failure keeps its own
/// reason and order.
fn verify_signature(token: &str, header_alg: &str, jwk: &Jwk) -> Result<TokenClaims, AuthFailure> {
    let algorithm = select_algorithm(header_alg, jwk)?;
    let key = decoding_key(jwk)?;

    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims = HashSet::new();

    let data = decode::<TokenClaims>(token, &key, &validation).map_err(|e| match e.kind() {
        ErrorKind::Json(_) | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
            AuthFailure::MalformedToken
        }
        _ => {
            tracing::debug!(target: "sign.auth.jwt", error = %e, "Signature verification failed");
            AuthFailure::InvalidSignature
        }
    })?;

    Ok(data.claims)
}
