//! Content store existence checks.
//!
//! A check has three outcomes: the object exists, it definitively does not,
//! or the store could not answer. Only the first two are facts; the third
//! is a [`StoreError`] and is never treated as absence.

use crate::content::join_key;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

/// Definitive answer from the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Exists,
    NotExists,
}

impl Presence {
    pub fn exists(self) -> bool {
        matches!(self, Presence::Exists)
    }
}

/// The content store could not give a definitive answer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("content store check for '{0}' timed out")]
    Timeout(String),

    #[error("content store request failed: {0}")]
    Transport(String),

    #[error("content store returned HTTP {status} for '{key}'")]
    UnexpectedStatus { key: String, status: u16 },

    #[error("content key '{0}' cannot be addressed")]
    InvalidKey(String),
}

/// Existence checks against the content store.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Check whether `key` exists.
    ///
    /// # Errors
    ///
    /// Any failure that is not a definitive not-found.
    async fn head(&self, key: &str) -> Result<Presence, StoreError>;
}

/// Content store reached over HTTP: `HEAD {base_url}/{key}`.
#[derive(Clone)]
pub struct HttpContentStore {
    client: Client,
    base_url: Url,
}

impl HttpContentStore {
    /// Create a store client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Store root (e.g., "https://media.example.com")
    /// * `timeout` - Upper bound for one HEAD request
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Transport` if the base URL is invalid or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Transport(format!("invalid store URL: {e}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| {
                tracing::error!(target: "sign.content.store", error = %e, "Failed to build HTTP client");
                StoreError::Transport(e.to_string())
            })?;

        Ok(Self { client, base_url })
    }
}

#[async_trait]
impl ContentStore for HttpContentStore {
    #[instrument(skip(self), fields(key = %key))]
    async fn head(&self, key: &str) -> Result<Presence, StoreError> {
        let url =
            join_key(&self.base_url, key).ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;

        let response = self.client.head(url).send().await.map_err(|e| {
            if e.is_timeout() {
                StoreError::Timeout(key.to_string())
            } else {
                tracing::warn!(target: "sign.content.store", error = %e, "HEAD request failed");
                StoreError::Transport(e.to_string())
            }
        })?;

        classify_status(key, response.status())
    }
}

fn classify_status(key: &str, status: StatusCode) -> Result<Presence, StoreError> {
    match status {
        s if s.is_success() => Ok(Presence::Exists),
        StatusCode::NOT_FOUND | StatusCode::GONE => Ok(Presence::NotExists),
        s => Err(StoreError::UnexpectedStatus {
            key: key.to_string(),
            status: s.as_u16(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status("k", StatusCode::OK),
            Ok(Presence::Exists)
        );
        assert_eq!(
            classify_status("k", StatusCode::NO_CONTENT),
            Ok(Presence::Exists)
        );
        assert_eq!(
            classify_status("k", StatusCode::NOT_FOUND),
            Ok(Presence::NotExists)
        );
        assert_eq!(
            classify_status("k", StatusCode::GONE),
            Ok(Presence::NotExists)
        );
        assert_eq!(
            classify_status("k", StatusCode::FORBIDDEN),
            Err(StoreError::UnexpectedStatus {
                key: "k".to_string(),
                status: 403
            })
        );
        assert!(classify_status("k", StatusCode::INTERNAL_SERVER_ERROR).is_err());
    }

    #[tokio::test]
    async fn test_head_exists_and_not_exists() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/videos/ar/%D9%82%D9%84%D8%A8.mp4"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = HttpContentStore::new(&server.uri(), Duration::from_secs(5)).unwrap();

        assert_eq!(
            store.head("videos/ar/قلب.mp4").await.unwrap(),
            Presence::Exists
        );
        assert_eq!(
            store.head("videos/ar/missing.mp4").await.unwrap(),
            Presence::NotExists
        );
    }

    #[tokio::test]
    async fn test_head_server_error_is_not_absence() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let store = HttpContentStore::new(&server.uri(), Duration::from_secs(5)).unwrap();

        let result = store.head("letters/ا.mp4").await;
        assert!(matches!(
            result,
            Err(StoreError::UnexpectedStatus { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_head_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let store = HttpContentStore::new(&server.uri(), Duration::from_millis(200)).unwrap();

        let result = store.head("letters/ا.mp4").await;
        assert_eq!(result, Err(StoreError::Timeout("letters/ا.mp4".to_string())));
    }

    #[tokio::test]
    async fn test_head_unreachable_store() {
        // Nothing listens on port 9 locally
        let store = HttpContentStore::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();

        let result = store.head("letters/ا.mp4").await;
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(HttpContentStore::new("not a url", Duration::from_secs(1)).is_err());
    }
}
