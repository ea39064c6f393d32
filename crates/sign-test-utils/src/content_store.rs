//! In-memory content store
//!
//! Stands in for the HTTP content store. Records every HEAD so tests can
//! assert on memoization, and can be switched into a failing state.

use async_trait::async_trait;
use sign_service::content::store::{ContentStore, Presence, StoreError};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryContentStore {
    keys: Mutex<HashSet<String>>,
    failure: Mutex<Option<StoreError>>,
    calls: Mutex<HashMap<String, usize>>,
    total_calls: AtomicUsize,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding exactly `keys`.
    pub fn with_keys<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let store = Self::new();
        for key in keys {
            store.insert(key);
        }
        store
    }

    pub fn insert(&self, key: impl Into<String>) {
        self.keys.lock().unwrap().insert(key.into());
    }

    pub fn remove(&self, key: &str) {
        self.keys.lock().unwrap().remove(key);
    }

    /// Every subsequent HEAD fails with `error` until [`Self::recover`].
    pub fn fail_with(&self, error: StoreError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    /// Number of HEADs issued, across all keys.
    pub fn head_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// Number of HEADs issued for `key`.
    pub fn calls_for(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn head(&self, key: &str) -> Result<Presence, StoreError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_insert(0) += 1;

        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }

        if self.keys.lock().unwrap().contains(key) {
            Ok(Presence::Exists)
        } else {
            Ok(Presence::NotExists)
        }
    }
}
