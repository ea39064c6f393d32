//! JWT helpers used before and after signature verification.
//!
//! The identity provider issues compact RS256 (or EdDSA) tokens whose header
//! names the signing key with `kid`. This module covers the parts of
//! verification that do not need the key itself:
//!
//! - Size limit, checked before any decoding
//! - Header parsing (`kid`, `alg`) without trusting the token
//! - Expiry check against an explicit clock with bounded leeway
//! - Decoding of OKP (`Ed25519`) public key material from a JWK
//!
//! Signature verification lives with the key-set cache in the service crate.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted token size in bytes (8KB).
///
/// Identity tokens from the provider are typically 1-2KB. Anything larger is
/// rejected before base64 decoding or JSON parsing.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

/// Default leeway applied to the `exp` claim.
pub const DEFAULT_EXP_LEEWAY: Duration = Duration::from_secs(0);

/// Upper bound for a configured `exp` leeway (10 minutes).
pub const MAX_EXP_LEEWAY: Duration = Duration::from_secs(600);

// =============================================================================
// Error Types
// =============================================================================

/// Failures detected without the signing key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token exceeds `MAX_JWT_SIZE_BYTES`.
    #[error("Token exceeds maximum allowed size")]
    TokenTooLarge,

    /// Not three dot-separated segments, or the header is not base64url JSON.
    #[error("Invalid JWT header")]
    MalformedToken,

    /// Header has no usable `kid`.
    #[error("Missing kid in token header")]
    MissingKid,

    /// `exp` claim is absent.
    #[error("Token has no expiry")]
    MissingExpiry,

    /// `exp` claim is not in the future.
    #[error("Token has expired")]
    Expired,
}

// =============================================================================
// Header
// =============================================================================

/// The unverified fields of a JWT header that key lookup needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Key ID naming the signing key in the provider's key set.
    pub kid: String,

    /// Algorithm the token claims to be signed with.
    pub alg: String,
}

#[derive(Deserialize)]
struct RawHeader {
    #[serde(default)]
    kid: Option<serde_json::Value>,
    #[serde(default)]
    alg: Option<String>,
}

/// Parse the header of a compact JWT without verifying anything.
///
/// The returned values are attacker-controlled. `kid` is only fit for a
/// lookup in a trusted key set, and `alg` must be checked against the key
/// that lookup returns.
///
/// # Errors
///
/// - `TokenTooLarge` when the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `MalformedToken` for a wrong segment count, bad base64, bad JSON, or a
///   missing `alg`
/// - `MissingKid` when `kid` is absent, empty, or not a string
pub fn parse_header(token: &str) -> Result<TokenHeader, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: over size limit"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let mut segments = token.split('.');
    let (Some(header_segment), Some(_), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        tracing::debug!(target: "common.jwt", "Token rejected: not three segments");
        return Err(JwtValidationError::MalformedToken);
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_segment).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Header is not base64url");
        JwtValidationError::MalformedToken
    })?;

    let raw: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Header is not JSON");
        JwtValidationError::MalformedToken
    })?;

    let alg = raw
        .alg
        .filter(|a| !a.is_empty())
        .ok_or(JwtValidationError::MalformedToken)?;

    let kid = raw
        .kid
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(JwtValidationError::MissingKid)?;

    Ok(TokenHeader { kid, alg })
}

// =============================================================================
// Claim-time checks
// =============================================================================

/// Check that `exp` lies in the future relative to `now` (Unix seconds).
///
/// # Errors
///
/// `MissingExpiry` if `exp` is `None`, `Expired` if `exp + leeway <= now`.
pub fn validate_exp_at(
    exp: Option<i64>,
    leeway: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    let exp = exp.ok_or(JwtValidationError::MissingExpiry)?;

    // leeway is bounded by MAX_EXP_LEEWAY
    #[allow(clippy::cast_possible_wrap)]
    let leeway_secs = leeway.as_secs() as i64;

    if exp.saturating_add(leeway_secs) <= now {
        tracing::debug!(
            target: "common.jwt",
            exp = exp,
            now = now,
            leeway_secs = leeway_secs,
            "Token rejected: expired"
        );
        return Err(JwtValidationError::Expired);
    }

    Ok(())
}

/// Decode the `x` member of an OKP JWK (base64url, no padding) into raw
/// `Ed25519` public key bytes.
///
/// # Errors
///
/// Returns `base64::DecodeError` when `x` is not valid base64url.
pub fn decode_ed25519_public_key_jwk(x_b64url: &str) -> Result<Vec<u8>, base64::DecodeError> {
    URL_SAFE_NO_PAD.decode(x_b64url)
}

// =============================================================================
// Tests
// =============================================================================
