//! Time-limited links to content.
//!
//! [`SignedLinkIssuer`] produces
//! `{public_base}/{key}?expires={unix}&signature={hex}` where the signature
//! is HMAC-SHA256 over `"{key}\n{expires}"`. The serving edge checks links
//! with [`SignedLinkIssuer::verify`].

use crate::content::join_key;
use async_trait::async_trait;
use reqwest::Url;
use ring::hmac;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("invalid public content URL: {0}")]
    InvalidBaseUrl(String),

    #[error("content key '{0}' cannot be linked")]
    InvalidKey(String),

    #[error("link issuing timed out")]
    Timeout,
}

/// Issues URLs through which clients fetch content.
#[async_trait]
pub trait LinkIssuer: Send + Sync {
    /// A URL for `key` valid for `expires_in`.
    async fn issue(&self, key: &str, expires_in: Duration) -> Result<String, LinkError>;
}

/// HMAC-signed links against a public base URL.
pub struct SignedLinkIssuer {
    public_base: Url,
    signing_key: hmac::Key,
}

impl SignedLinkIssuer {
    /// # Errors
    ///
    /// `LinkError::InvalidBaseUrl` if `public_base` does not parse.
    pub fn new(public_base: &str, secret: &SecretString) -> Result<Self, LinkError> {
        let public_base =
            Url::parse(public_base).map_err(|e| LinkError::InvalidBaseUrl(e.to_string()))?;
        let signing_key = hmac::Key::new(hmac::HMAC_SHA256, secret.expose_secret().as_bytes());

        Ok(Self {
            public_base,
            signing_key,
        })
    }

    /// Issue a link that expires at `now + expires_in` (Unix seconds).
    ///
    /// # Errors
    ///
    /// `LinkError::InvalidKey` if the key cannot be appended to the base URL.
    pub fn issue_at(&self, key: &str, expires_in: Duration, now: i64) -> Result<String, LinkError> {
        let expires_in = i64::try_from(expires_in.as_secs()).unwrap_or(i64::MAX);
        let expires = now.saturating_add(expires_in);
        let signature = hex::encode(self.sign(key, expires).as_ref());

        let mut url = join_key(&self.public_base, key)
            .ok_or_else(|| LinkError::InvalidKey(key.to_string()))?;
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        Ok(url.into())
    }

    /// Check a link's signature and expiry; the comparison is constant-time.
    pub fn verify(&self, key: &str, expires: i64, signature_hex: &str, now: i64) -> bool {
        if expires <= now {
            return false;
        }
        let Ok(signature) = hex::decode(signature_hex) else {
            return false;
        };
        hmac::verify(&self.signing_key, message(key, expires).as_bytes(), &signature).is_ok()
    }

    fn sign(&self, key: &str, expires: i64) -> hmac::Tag {
        hmac::sign(&self.signing_key, message(key, expires).as_bytes())
    }
}

fn message(key: &str, expires: i64) -> String {
    format!("{key}\n{expires}")
}

#[async_trait]
impl LinkIssuer for SignedLinkIssuer {
    async fn issue(&self, key: &str, expires_in: Duration) -> Result<String, LinkError> {
        self.issue_at(key, expires_in, chrono::Utc::now().timestamp())
    }
}
