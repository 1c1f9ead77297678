//! Open Library search client for book covers.

use board::doc::Media;
use board::search::{SearchError, SearchProvider, SearchRequest, SearchResult};
use serde::Deserialize;
use tracing::debug;

use super::fetch;

const FIELDS: &str = "title,author_name,cover_i";
const PAGE_SIZE: &str = "5";

pub struct OpenLibraryProvider {
    http: reqwest::Client,
    base_url: String,
    covers_url: String,
}

impl OpenLibraryProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: &str, covers_url: &str) -> Self {
        Self { http, base_url: base_url.to_owned(), covers_url: covers_url.to_owned() }
    }
}

#[async_trait::async_trait]
impl SearchProvider for OpenLibraryProvider {
    fn media(&self) -> Media {
        Media::Book
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResult, SearchError> {
        let title = request.title.trim();
        let author = request.subtitle.trim();
        debug!(title, author, "openlibrary search");
        let mut query = vec![("title", title), ("fields", FIELDS), ("limit", PAGE_SIZE)];
        if !author.is_empty() {
            query.push(("author", author));
        }
        let body = fetch(self.http.get(format!("{}/search.json", self.base_url)).query(&query)).await?;
        parse_response(&body, request, &self.covers_url)
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    docs: Vec<ApiDoc>,
}

#[derive(Deserialize)]
struct ApiDoc {
    title: Option<String>,
    #[serde(default)]
    author_name: Vec<String>,
    cover_i: Option<i64>,
}

/// First document with a cover, linked to its large cover image.
fn parse_response(json: &str, request: &SearchRequest, covers_url: &str) -> Result<SearchResult, SearchError> {
    let api: ApiResponse = serde_json::from_str(json).map_err(|e| SearchError::Parse(e.to_string()))?;
    let (doc, cover) = api
        .docs
        .into_iter()
        .find_map(|doc| doc.cover_i.filter(|id| *id > 0).map(|id| (doc, id)))
        .ok_or_else(|| SearchError::NoMatch(request.title.clone()))?;

    Ok(SearchResult {
        link: format!("{covers_url}/b/id/{cover}-L.jpg"),
        title: doc.title.unwrap_or_else(|| request.title.clone()),
        subtitle: doc
            .author_name
            .into_iter()
            .next()
            .unwrap_or_else(|| request.subtitle.clone()),
        index: 0,
    })
}

#[cfg(test)]
#[path = "openlibrary_test.rs"]
mod tests;
