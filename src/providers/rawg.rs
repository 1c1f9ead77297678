//! RAWG video game database client.
//!
//! RAWG rejects anonymous requests, so the API key travels with each
//! request as its secret and a missing key fails before any I/O.

use board::doc::Media;
use board::search::{SearchError, SearchProvider, SearchRequest, SearchResult};
use serde::Deserialize;
use tracing::debug;

use super::{fetch, search_term};

pub struct RawgProvider {
    http: reqwest::Client,
    base_url: String,
}

impl RawgProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self { http, base_url: base_url.to_owned() }
    }
}

#[async_trait::async_trait]
impl SearchProvider for RawgProvider {
    fn media(&self) -> Media {
        Media::Game
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let key = request
            .secret
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(SearchError::MissingSecret { media: Media::Game })?;
        let term = search_term(&request.title, &request.subtitle);
        debug!(%term, "rawg search");
        let body = fetch(self.http.get(format!("{}/games", self.base_url)).query(&[
            ("key", key),
            ("search", term.as_str()),
            ("page_size", "5"),
        ]))
        .await?;
        parse_response(&body, request)
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    results: Vec<ApiGame>,
}

#[derive(Deserialize)]
struct ApiGame {
    name: Option<String>,
    released: Option<String>,
    background_image: Option<String>,
}

/// First game with an image. The subtitle is the query's, else the release year.
fn parse_response(json: &str, request: &SearchRequest) -> Result<SearchResult, SearchError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| SearchError::Parse(e.to_string()))?;
    let (game, link) = api
        .results
        .into_iter()
        .find_map(|game| game.background_image.clone().filter(|l| !l.is_empty()).map(|link| (game, link)))
        .ok_or_else(|| SearchError::NoMatch(request.title.clone()))?;

    let subtitle = if request.subtitle.trim().is_empty() {
        game.released.as_deref().and_then(|d| d.get(..4)).unwrap_or_default().to_owned()
    } else {
        request.subtitle.clone()
    };
    Ok(SearchResult { link, title: game.name.unwrap_or_else(|| request.title.clone()), subtitle, index: 0 })
}

#[cfg(test)]
#[path = "rawg_test.rs"]
mod tests;
