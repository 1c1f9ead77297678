//! Search provider configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_ITUNES_BASE_URL: &str = "https://itunes.apple.com";
pub const DEFAULT_OPENLIBRARY_BASE_URL: &str = "https://openlibrary.org";
pub const DEFAULT_OPENLIBRARY_COVERS_URL: &str = "https://covers.openlibrary.org";
pub const DEFAULT_RAWG_BASE_URL: &str = "https://api.rawg.io/api";
pub const DEFAULT_ITUNES_COUNTRY: &str = "US";
pub const DEFAULT_SEARCH_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_SEARCH_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl SearchTimeouts {
    #[must_use]
    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }

    #[must_use]
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub itunes_base_url: String,
    pub itunes_country: String,
    pub openlibrary_base_url: String,
    pub openlibrary_covers_url: String,
    pub rawg_base_url: String,
    pub rawg_api_key: Option<String>,
    pub timeouts: SearchTimeouts,
}

impl SearchConfig {
    /// Build typed search config from environment variables.
    ///
    /// Optional:
    /// - `COVERBOARD_ITUNES_BASE_URL`: default iTunes Search API
    /// - `COVERBOARD_ITUNES_COUNTRY`: storefront, default `US`
    /// - `COVERBOARD_OPENLIBRARY_BASE_URL`: default Open Library
    /// - `COVERBOARD_OPENLIBRARY_COVERS_URL`: default Open Library covers host
    /// - `COVERBOARD_RAWG_BASE_URL`: default RAWG API
    /// - `RAWG_API_KEY`: game search is disabled without it
    /// - `COVERBOARD_SEARCH_TIMEOUT_SECS`: default 20
    /// - `COVERBOARD_SEARCH_CONNECT_TIMEOUT_SECS`: default 5
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
                .trim_end_matches('/')
                .to_owned()
        };
        let secs = |key: &str, default: u64| lookup(key).and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(default);

        Self {
            itunes_base_url: url("COVERBOARD_ITUNES_BASE_URL", DEFAULT_ITUNES_BASE_URL),
            itunes_country: lookup("COVERBOARD_ITUNES_COUNTRY")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ITUNES_COUNTRY.to_owned()),
            openlibrary_base_url: url("COVERBOARD_OPENLIBRARY_BASE_URL", DEFAULT_OPENLIBRARY_BASE_URL),
            openlibrary_covers_url: url("COVERBOARD_OPENLIBRARY_COVERS_URL", DEFAULT_OPENLIBRARY_COVERS_URL),
            rawg_base_url: url("COVERBOARD_RAWG_BASE_URL", DEFAULT_RAWG_BASE_URL),
            rawg_api_key: lookup("RAWG_API_KEY").filter(|v| !v.trim().is_empty()),
            timeouts: SearchTimeouts {
                request_secs: secs("COVERBOARD_SEARCH_TIMEOUT_SECS", DEFAULT_SEARCH_REQUEST_TIMEOUT_SECS),
                connect_secs: secs("COVERBOARD_SEARCH_CONNECT_TIMEOUT_SECS", DEFAULT_SEARCH_CONNECT_TIMEOUT_SECS),
            },
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
