//! Memoized existence checks.
//!
//! Definitive answers from the content store are kept in a bounded LRU with
//! a per-entry TTL. Store failures are never cached. The cache lock is held
//! only for the lookup and the insert, never across the remote call, so two
//! concurrent misses for one key may both reach the store.

use crate::config::TOKEN_PLACEHOLDER;
use crate::content::store::{ContentStore, StoreError};
use crate::observability::metrics::{record_existence_cache, record_store_check};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::instrument;

/// Format a content key from a `{token}` pattern.
pub fn content_key(pattern: &str, token: &str) -> String {
    pattern.replace(TOKEN_PLACEHOLDER, token)
}

#[derive(Clone, Copy)]
struct CachedPresence {
    exists: bool,
    cached_at: Instant,
}

/// Bounded LRU of content key to existence, with TTL.
pub struct ExistenceCache {
    entries: Mutex<LruCache<String, CachedPresence>>,
    ttl: Duration,
}

impl ExistenceCache {
    /// Create a cache holding at most `capacity` keys for `ttl` each.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Cached answer for `key`, dropping it if expired.
    pub async fn get(&self, key: &str) -> Option<bool> {
        let mut entries = self.entries.lock().await;
        match entries.get(key).copied() {
            Some(entry) if entry.cached_at.elapsed() < self.ttl => Some(entry.exists),
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, key: &str, exists: bool) {
        self.entries.lock().await.put(
            key.to_string(),
            CachedPresence {
                exists,
                cached_at: Instant::now(),
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

/// Resolves content keys against the store through the existence cache.
pub struct ExistenceResolver {
    store: Arc<dyn ContentStore>,
    cache: ExistenceCache,
    store_timeout: Duration,
}

impl ExistenceResolver {
    /// # Arguments
    ///
    /// * `store` - Definitive existence source
    /// * `cache` - Memo of definitive answers
    /// * `store_timeout` - Upper bound for one store call
    pub fn new(store: Arc<dyn ContentStore>, cache: ExistenceCache, store_timeout: Duration) -> Self {
        Self {
            store,
            cache,
            store_timeout,
        }
    }

    pub fn cache(&self) -> &ExistenceCache {
        &self.cache
    }

    /// Whether `key` exists in the content store.
    ///
    /// # Errors
    ///
    /// `StoreError` when the store fails or exceeds the timeout. Nothing is
    /// cached in that case.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        if let Some(exists) = self.cache.get(key).await {
            record_existence_cache(true);
            return Ok(exists);
        }
        record_existence_cache(false);

        let presence = match tokio::time::timeout(self.store_timeout, self.store.head(key)).await {
            Ok(Ok(presence)) => presence,
            Ok(Err(e)) => {
                record_store_check("error");
                tracing::warn!(target: "sign.content.existence", error = %e, "Existence check failed");
                return Err(e);
            }
            Err(_) => {
                record_store_check("timeout");
                tracing::warn!(target: "sign.content.existence", "Existence check timed out");
                return Err(StoreError::Timeout(key.to_string()));
            }
        };

        let exists = presence.exists();
        record_store_check(if exists { "exists" } else { "not_exists" });
        self.cache.put(key, exists).await;

        Ok(exists)
    }

    /// First key, in pattern order, that exists for `token`.
    ///
    /// Stops at the first existing key; later patterns are not checked.
    ///
    /// # Errors
    ///
    /// The first `StoreError` encountered.
    pub async fn first_existing(
        &self,
        patterns: &[String],
        token: &str,
    ) -> Result<Option<String>, StoreError> {
        for pattern in patterns {
            let key = content_key(pattern, token);
            if self.exists(&key).await? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }
}
