//! Sign-language media content.
//!
//! - `store` - definitive existence checks against the content store
//! - `existence` - memoized existence checks and pattern resolution
//! - `links` - time-limited URLs for content keys

pub mod existence;
pub mod links;
pub mod store;

use reqwest::Url;

/// Append a slash-separated content key to `base`, percent-encoding each
/// segment.
///
/// Returns `None` if `base` cannot carry a path.
pub(crate) fn join_key(base: &Url, key: &str) -> Option<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(key.split('/'));
    Some(url)
}
