//! Cover search: provider-neutral request/response types and fan-out.
//!
//! Concrete HTTP providers live in the host binary; this module only defines
//! the `SearchProvider` seam and the concurrency policy. Every query in a
//! batch runs at once and settles on its own, so one failing lookup never
//! hides the others.

#[cfg(test)]
#[path = "search_test.rs"]
mod search_test;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::doc::Media;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by a single search query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    /// The request never produced a response.
    #[error("search request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success HTTP status.
    #[error("search response error: status {status}")]
    Status { status: u16 },

    /// The response body did not have the expected shape.
    #[error("search response parse failed: {0}")]
    Parse(String),

    /// The provider needs an API key and none was given.
    #[error("missing API key for {media} search")]
    MissingSecret { media: Media },

    /// No provider is registered for this media type.
    #[error("no search provider for {0}")]
    Unsupported(Media),

    /// The provider answered but found nothing usable.
    #[error("no results for {0:?}")]
    NoMatch(String),
}

// =============================================================================
// TYPES
// =============================================================================

/// One `title, subtitle` pair to look up, as read from CSV or typed by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub title: String,
    pub subtitle: String,
}

impl SearchQuery {
    #[must_use]
    pub fn new(title: &str, subtitle: &str) -> Self {
        Self { title: title.to_owned(), subtitle: subtitle.to_owned() }
    }
}

/// What a provider receives for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub title: String,
    pub subtitle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// A normalized hit: an image link plus the labels to put on the cover.
///
/// `index` is the position of the query that produced it, so results can be
/// laid out in input order even though queries settle out of order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub link: String,
    pub title: String,
    pub subtitle: String,
    pub index: usize,
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// A search backend for one media type. Enables mocking in tests.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    /// The media type this provider serves.
    fn media(&self) -> Media;

    /// Look up one request. `index` is left at 0; [`search_all`] fills it.
    ///
    /// # Errors
    ///
    /// Returns a [`SearchError`] if the request fails, the response is
    /// malformed, or nothing matched.
    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError>;
}

/// Providers keyed by the media type they serve.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<Media, Arc<dyn SearchProvider>>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under its own media type, replacing any previous one.
    pub fn register(&mut self, provider: Arc<dyn SearchProvider>) {
        self.providers.insert(provider.media(), provider);
    }

    /// Provider for `media`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Unsupported`] when nothing is registered.
    pub fn get(&self, media: Media) -> Result<Arc<dyn SearchProvider>, SearchError> {
        self.providers.get(&media).cloned().ok_or(SearchError::Unsupported(media))
    }

    #[must_use]
    pub fn media(&self) -> Vec<Media> {
        self.providers.keys().copied().collect()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry").field("media", &self.media()).finish()
    }
}

// =============================================================================
// FAN-OUT
// =============================================================================

/// Run every query against `provider` concurrently.
///
/// Returns one entry per query, in query order. Successful results carry
/// their query index; failures are returned in place, not propagated.
pub async fn search_all(
    provider: &dyn SearchProvider,
    queries: &[SearchQuery],
    secret: Option<&str>,
) -> Vec<Result<SearchResult, SearchError>> {
    let media = provider.media();
    let requests: Vec<SearchRequest> = queries
        .iter()
        .map(|q| SearchRequest {
            title: q.title.clone(),
            subtitle: q.subtitle.clone(),
            secret: secret.map(str::to_owned),
        })
        .collect();

    let pending = requests.iter().enumerate().map(|(index, request)| async move {
        provider.search(request).await.map(|hit| SearchResult { index, ..hit })
    });
    let settled = join_all(pending).await;

    let failed = settled.iter().filter(|r| r.is_err()).count();
    if failed > 0 {
        warn!(%media, failed, total = settled.len(), "some searches failed");
    } else {
        debug!(%media, total = settled.len(), "searches settled");
    }
    settled
}

/// Keep the successful results, in query order.
#[must_use]
pub fn successes(settled: Vec<Result<SearchResult, SearchError>>) -> Vec<SearchResult> {
    settled.into_iter().filter_map(Result::ok).collect()
}
