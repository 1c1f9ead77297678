//! HTTP cover search providers.
//!
//! DESIGN
//! ======
//! One thin client per public catalogue, each implementing the board crate's
//! `SearchProvider` trait. Request building and response parsing are split
//! so the parsers are pure functions tested against recorded payloads.
//!
//! - iTunes Search serves music, movies, and TV shows.
//! - Open Library serves books.
//! - RAWG serves games and needs an API key passed as the request secret.

pub mod itunes;
pub mod openlibrary;
pub mod rawg;

use std::sync::Arc;

use board::doc::Media;
use board::search::{ProviderRegistry, SearchError};

use crate::config::{SearchConfig, SearchTimeouts};

/// Build the shared HTTP client with the configured timeouts.
///
/// # Errors
///
/// Returns the builder error if TLS or the client cannot be initialised.
pub fn http_client(timeouts: SearchTimeouts) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeouts.request())
        .connect_timeout(timeouts.connect())
        .user_agent(concat!("coverboard/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Every provider, keyed by media.
///
/// # Errors
///
/// Returns the builder error if the HTTP client cannot be built.
pub fn registry(config: &SearchConfig) -> Result<ProviderRegistry, reqwest::Error> {
    let http = http_client(config.timeouts)?;
    let mut registry = ProviderRegistry::new();
    for media in [Media::Music, Media::Movie, Media::TvShow] {
        registry.register(Arc::new(itunes::ItunesProvider::new(
            http.clone(),
            &config.itunes_base_url,
            &config.itunes_country,
            media,
        )));
    }
    registry.register(Arc::new(openlibrary::OpenLibraryProvider::new(
        http.clone(),
        &config.openlibrary_base_url,
        &config.openlibrary_covers_url,
    )));
    registry.register(Arc::new(rawg::RawgProvider::new(http, &config.rawg_base_url)));
    Ok(registry)
}

/// Send a prepared request and return the body of a 200 response.
async fn fetch(request: reqwest::RequestBuilder) -> Result<String, SearchError> {
    let response = request.send().await.map_err(|e| SearchError::Request(e.to_string()))?;
    let status = response.status().as_u16();
    if status != 200 {
        return Err(SearchError::Status { status });
    }
    response.text().await.map_err(|e| SearchError::Request(e.to_string()))
}

/// `title subtitle`, without the gap when either is blank.
fn search_term(title: &str, subtitle: &str) -> String {
    format!("{} {}", title.trim(), subtitle.trim()).trim().to_owned()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
