//! Key-set cache for the identity provider's public signing keys.
//!
//! Keys are fetched from the provider's `/.well-known/jwks.json` document
//! through a [`KeySetSource`] and cached as one immutable snapshot.
//!
//! # Refresh rules
//!
//! - Empty or older than the TTL: refresh before answering
//! - Unknown `kid`: one forced refresh, unless this lookup already refreshed
//! - Failed refresh keeps serving the previous snapshot; with no snapshot at
//!   all the lookup fails with [`AuthFailure::KeySetUnavailable`]
//!
//! Refreshes build a complete new snapshot and swap it in under the write
//! lock, so readers only ever see a whole snapshot.

use crate::auth::jwt::AuthFailure;
use crate::observability::metrics::record_jwks_refresh;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::instrument;

/// JSON Web Key from the provider's key set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "OKP").
    pub kty: String,

    /// Key ID - used to select the correct key for verification.
    pub kid: String,

    /// Algorithm the key signs with (e.g. "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (should be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// RSA modulus (base64url).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url).
    #[serde(default)]
    pub e: Option<String>,

    /// Curve name for OKP keys ("Ed25519").
    #[serde(default)]
    pub crv: Option<String>,

    /// OKP public key (base64url).
    #[serde(default)]
    pub x: Option<String>,
}

/// The key set document.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    pub keys: Vec<Jwk>,
}

/// Why a key-set fetch produced no usable document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeySetFetchError {
    #[error("key set request failed: {0}")]
    Transport(String),

    #[error("key set endpoint returned HTTP {0}")]
    Status(u16),

    #[error("key set document could not be parsed: {0}")]
    Parse(String),

    #[error("key set document contains no keys")]
    Empty,

    #[error("key set fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Where key set documents come from.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<JwksDocument, KeySetFetchError>;
}

/// Fetches the key set over HTTP.
pub struct HttpKeySetSource {
    url: String,
    http_client: reqwest::Client,
}

impl HttpKeySetSource {
    /// Create a source for `url`; every request is bounded by `timeout`.
    pub fn new(url: String, timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "sign.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self { url, http_client }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<JwksDocument, KeySetFetchError> {
        tracing::debug!(target: "sign.auth.jwks", url = %self.url, "Fetching key set");

        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| KeySetFetchError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(KeySetFetchError::Status(response.status().as_u16()));
        }

        response
            .json::<JwksDocument>()
            .await
            .map_err(|e| KeySetFetchError::Parse(e.to_string()))
    }
}

/// One complete fetched key set.
struct KeySetSnapshot {
    keys: HashMap<String, Jwk>,
    fetched_at: Instant,
}

/// Process-wide cache of the provider's signing keys.
pub struct KeySetCache {
    source: Arc<dyn KeySetSource>,
    snapshot: RwLock<Option<Arc<KeySetSnapshot>>>,
    ttl: Duration,
    fetch_timeout: Duration,
}

impl KeySetCache {
    /// Create an empty cache; the first lookup populates it.
    ///
    /// # Arguments
    ///
    /// * `source` - Where key set documents are fetched from
    /// * `ttl` - Maximum age of a snapshot before lookups refresh it
    /// * `fetch_timeout` - Upper bound for a single fetch
    pub fn new(source: Arc<dyn KeySetSource>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            source,
            snapshot: RwLock::new(None),
            ttl,
            fetch_timeout,
        }
    }

    /// Resolve a signing key by ID.
    ///
    /// # Errors
    ///
    /// - `KeySetUnavailable` if no snapshot has ever been fetched
    /// - `UnknownKey` if `kid` is absent after the allowed refresh
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get_key(&self, kid: &str) -> Result<Jwk, AuthFailure> {
        let mut refreshed = false;

        let snapshot = match self.current().await {
            Some(snapshot) if !self.is_stale(&snapshot) => snapshot,
            _ => {
                refreshed = true;
                self.refresh_logged().await;
                self.current().await.ok_or_else(|| {
                    tracing::warn!(target: "sign.auth.jwks", "No key set available");
                    AuthFailure::KeySetUnavailable
                })?
            }
        };

        if let Some(key) = snapshot.keys.get(kid) {
            tracing::debug!(target: "sign.auth.jwks", "Key set cache hit");
            return Ok(key.clone());
        }

        if !refreshed {
            tracing::debug!(target: "sign.auth.jwks", "Unknown kid, forcing key set refresh");
            self.refresh_logged().await;
            if let Some(key) = self
                .current()
                .await
                .and_then(|snapshot| snapshot.keys.get(kid).cloned())
            {
                return Ok(key);
            }
        }

        tracing::warn!(target: "sign.auth.jwks", "Key not found in key set after refresh");
        Err(AuthFailure::UnknownKey)
    }

    /// Fetch the key set now, replacing the snapshot on success.
    ///
    /// # Errors
    ///
    /// Returns the fetch failure; the previous snapshot stays in place.
    pub async fn force_refresh(&self) -> Result<(), KeySetFetchError> {
        self.refresh().await
    }

    /// Whether at least one fetch has succeeded.
    pub async fn is_populated(&self) -> bool {
        self.snapshot.read().await.is_some()
    }

    async fn current(&self) -> Option<Arc<KeySetSnapshot>> {
        self.snapshot.read().await.clone()
    }

    fn is_stale(&self, snapshot: &KeySetSnapshot) -> bool {
        snapshot.fetched_at.elapsed() >= self.ttl
    }

    async fn refresh_logged(&self) {
        if let Err(e) = self.refresh().await {
            tracing::warn!(
                target: "sign.auth.jwks",
                error = %e,
                "Key set refresh failed, keeping previous snapshot"
            );
        }
    }

    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<(), KeySetFetchError> {
        let fetched = tokio::time::timeout(self.fetch_timeout, self.source.fetch()).await;

        let document = match fetched {
            Ok(Ok(document)) => document,
            Ok(Err(e)) => {
                record_jwks_refresh("error");
                return Err(e);
            }
            Err(_) => {
                record_jwks_refresh("timeout");
                return Err(KeySetFetchError::Timeout(self.fetch_timeout));
            }
        };

        let keys: HashMap<String, Jwk> = document
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        if keys.is_empty() {
            record_jwks_refresh("error");
            return Err(KeySetFetchError::Empty);
        }

        tracing::info!(
            target: "sign.auth.jwks",
            key_count = keys.len(),
            "Key set cache refreshed"
        );

        let snapshot = Arc::new(KeySetSnapshot {
            keys,
            fetched_at: Instant::now(),
        });
        *self.snapshot.write().await = Some(snapshot);
        record_jwks_refresh("success");

        Ok(())
    }
}
