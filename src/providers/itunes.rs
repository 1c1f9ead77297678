//! iTunes Search API client for music, movie, and TV show covers.
//!
//! Artwork URLs come back at 100px; the size segment is rewritten to ask the
//! CDN for a print-friendly 600px image.

use board::doc::Media;
use board::search::{SearchError, SearchProvider, SearchRequest, SearchResult};
use serde::Deserialize;
use tracing::debug;

use super::{fetch, search_term};

const ARTWORK_SMALL: &str = "100x100bb";
const ARTWORK_LARGE: &str = "600x600bb";

pub struct ItunesProvider {
    http: reqwest::Client,
    base_url: String,
    country: String,
    media: Media,
}

impl ItunesProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str, country: &str, media: Media) -> Self {
        Self { http, base_url: base_url.to_owned(), country: country.to_owned(), media }
    }
}

/// `(media, entity)` query parameters for a media type.
fn catalogue(media: Media) -> Result<(&'static str, &'static str), SearchError> {
    match media {
        Media::Music => Ok(("music", "album")),
        Media::Movie => Ok(("movie", "movie")),
        Media::TvShow => Ok(("tvShow", "tvSeason")),
        Media::Book | Media::Game => Err(SearchError::Unsupported(media)),
    }
}

#[async_trait::async_trait]
impl SearchProvider for ItunesProvider {
    fn media(&self) -> Media {
        self.media
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let (media, entity) = catalogue(self.media)?;
        let term = search_term(&request.title, &request.subtitle);
        debug!(%term, media, "itunes search");
        let body = fetch(self.http.get(format!("{}/search", self.base_url)).query(&[
            ("term", term.as_str()),
            ("media", media),
            ("entity", entity),
            ("country", self.country.as_str()),
            ("limit", "1"),
        ]))
        .await?;
        parse_response(&body, request)
    }
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    results: Vec<ApiItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
    collection_name: Option<String>,
    track_name: Option<String>,
    artist_name: Option<String>,
    artwork_url100: Option<String>,
}

// =============================================================================
// PARSING
// =============================================================================

fn parse_response(json: &str, request: &SearchRequest) -> Result<SearchResult, SearchError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| SearchError::Parse(e.to_string()))?;
    let item = api
        .results
        .into_iter()
        .find(|item| item.artwork_url100.is_some())
        .ok_or_else(|| SearchError::NoMatch(request.title.clone()))?;

    let link = item.artwork_url100.unwrap_or_default().replace(ARTWORK_SMALL, ARTWORK_LARGE);
    let title = item.collection_name.or(item.track_name).unwrap_or_else(|| request.title.clone());
    let subtitle = item.artist_name.unwrap_or_else(|| request.subtitle.clone());
    Ok(SearchResult { link, title, subtitle, index: 0 })
}

#[cfg(test)]
#[path = "itunes_test.rs"]
mod tests;
