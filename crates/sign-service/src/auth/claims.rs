//! Identity token claims.
//!
//! `TokenClaims` is the raw payload as the identity provider signs it.
//! `IdentityClaims` is the verified, request-scoped projection handed to
//! handlers. `sub` and `email` are redacted in Debug output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The `aud` claim: a single audience or a list of them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    One(String),
    Many(Vec<String>),
}

impl Audience {
    /// Whether `client_id` is (one of) the audience(s).
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Audience::One(aud) => aud == client_id,
            Audience::Many(auds) => auds.iter().any(|a| a == client_id),
        }
    }
}

/// Raw claims decoded from a signature-verified token.
///
/// Every field is optional so that a missing claim surfaces as a specific
/// rejection instead of a decode failure.
#[derive(Clone, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub iss: Option<String>,

    #[serde(default)]
    pub aud: Option<Audience>,

    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub token_use: Option<String>,

    #[serde(default)]
    pub sub: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub given_name: Option<String>,

    #[serde(default, rename = "cognito:username")]
    pub username: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub gender: Option<String>,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("exp", &self.exp)
            .field("token_use", &self.token_use)
            .field("sub", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

/// Verified identity of the caller, inserted into request extensions by the
/// auth middleware.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Subject identifier - redacted in Debug output.
    pub sub: String,

    /// Display name: `name`, else `given_name`, else the provider username.
    pub name: String,

    /// Email address - redacted in Debug output.
    pub email: Option<String>,

    pub gender: Option<String>,

    /// Purpose claim the token was issued for.
    pub token_use: String,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for IdentityClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityClaims")
            .field("sub", &"[REDACTED]")
            .field("name", &self.name)
            .field("email", &self.email.as_ref().map(|_| "[REDACTED]"))
            .field("gender", &self.gender)
            .field("token_use", &self.token_use)
            .field("exp", &self.exp)
            .finish()
    }
}

impl IdentityClaims {
    /// Project verified raw claims into the request identity.
    ///
    /// Callers must have already checked `exp` and `token_use`.
    pub fn from_verified(claims: TokenClaims, exp: i64, token_use: String) -> Self {
        let name = [claims.name, claims.given_name, claims.username]
            .into_iter()
            .flatten()
            .find(|n| !n.is_empty())
            .unwrap_or_default();

        Self {
            sub: claims.sub.unwrap_or_default(),
            name,
            email: claims.email,
            gender: claims.gender,
            token_use,
            exp,
        }
    }
}
