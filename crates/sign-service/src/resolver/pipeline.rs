//! Text to ordered sign clips.
//!
//! normalize -> split into words -> decompose each word in order -> cap ->
//! issue a link per clip. The cap truncates mid-word, and no existence check
//! is issued once it is reached.

use crate::content::links::{LinkError, LinkIssuer};
use crate::errors::SignError;
use crate::observability::metrics::record_resolved_clips;
use crate::resolver::decomposer::{ResolvedToken, WordDecomposer};
use crate::resolver::normalize::normalize;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::instrument;

/// One clip in the response, in playback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedClip {
    pub token: String,
    pub url: String,
    pub key: String,
}

/// Pipeline limits.
#[derive(Debug, Clone, Copy)]
pub struct PipelineSettings {
    /// Maximum clips per resolution; must be > 0.
    pub max_clips: usize,

    /// Validity of issued links.
    pub link_expiry: Duration,

    /// Upper bound for issuing one link.
    pub link_timeout: Duration,
}

pub struct ResolutionPipeline {
    decomposer: WordDecomposer,
    links: Arc<dyn LinkIssuer>,
    settings: PipelineSettings,
}

impl ResolutionPipeline {
    pub fn new(
        decomposer: WordDecomposer,
        links: Arc<dyn LinkIssuer>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            decomposer,
            links,
            settings,
        }
    }

    /// Resolve `text` into at most `max_clips` clips.
    ///
    /// Blank input returns an empty list without touching the store.
    ///
    /// # Errors
    ///
    /// - `SignError::StoreUnavailable` if an existence check fails
    /// - `SignError::Internal` if a link cannot be issued
    #[instrument(skip_all, fields(text_len = text.len()))]
    pub async fn resolve(&self, text: &str) -> Result<Vec<ResolvedClip>, SignError> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let normalized = normalize(text);
        let tokens = self.tokens(&normalized).await?;

        let mut clips = Vec::with_capacity(tokens.len());
        for token in tokens {
            let url = self.issue_link(&token.content_key).await?;
            clips.push(ResolvedClip {
                token: token.display_token,
                url,
                key: token.content_key,
            });
        }

        tracing::debug!(target: "sign.resolver", clips = clips.len(), "Text resolved");
        record_resolved_clips(clips.len());

        Ok(clips)
    }

    async fn tokens(&self, normalized: &str) -> Result<Vec<ResolvedToken>, SignError> {
        let max = self.settings.max_clips;
        let mut tokens = Vec::new();

        for word in normalized.split_whitespace() {
            let remaining = max.saturating_sub(tokens.len());
            if remaining == 0 {
                tracing::debug!(target: "sign.resolver", max_clips = max, "Clip cap reached, truncating");
                break;
            }
            tokens.extend(self.decomposer.decompose_bounded(word, remaining).await?);
        }

        Ok(tokens)
    }

    async fn issue_link(&self, key: &str) -> Result<String, LinkError> {
        tokio::time::timeout(
            self.settings.link_timeout,
            self.links.issue(key, self.settings.link_expiry),
        )
        .await
        .map_err(|_| LinkError::Timeout)?
    }
}
