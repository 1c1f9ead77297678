use std::collections::HashMap;

use super::*;

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| ((*k).to_owned(), (*v).to_owned())).collect();
    move |key| map.get(key).cloned()
}

#[test]
fn defaults_when_nothing_is_set() {
    let cfg = SearchConfig::from_lookup(lookup(&[]));
    assert_eq!(cfg.itunes_base_url, DEFAULT_ITUNES_BASE_URL);
    assert_eq!(cfg.itunes_country, DEFAULT_ITUNES_COUNTRY);
    assert_eq!(cfg.openlibrary_base_url, DEFAULT_OPENLIBRARY_BASE_URL);
    assert_eq!(cfg.openlibrary_covers_url, DEFAULT_OPENLIBRARY_COVERS_URL);
    assert_eq!(cfg.rawg_base_url, DEFAULT_RAWG_BASE_URL);
    assert_eq!(cfg.rawg_api_key, None);
    assert_eq!(
        cfg.timeouts,
        SearchTimeouts {
            request_secs: DEFAULT_SEARCH_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_SEARCH_CONNECT_TIMEOUT_SECS
        }
    );
    assert_eq!(cfg, SearchConfig::default());
}

#[test]
fn overrides_are_trimmed() {
    let cfg = SearchConfig::from_lookup(lookup(&[
        ("COVERBOARD_ITUNES_BASE_URL", "http://localhost:9000/"),
        ("COVERBOARD_ITUNES_COUNTRY", "GB"),
        ("COVERBOARD_RAWG_BASE_URL", "https://rawg.test/api/"),
        ("RAWG_API_KEY", "k3y"),
        ("COVERBOARD_SEARCH_TIMEOUT_SECS", " 42 "),
        ("COVERBOARD_SEARCH_CONNECT_TIMEOUT_SECS", "7"),
    ]));
    assert_eq!(cfg.itunes_base_url, "http://localhost:9000");
    assert_eq!(cfg.itunes_country, "GB");
    assert_eq!(cfg.rawg_base_url, "https://rawg.test/api");
    assert_eq!(cfg.rawg_api_key.as_deref(), Some("k3y"));
    assert_eq!(cfg.timeouts, SearchTimeouts { request_secs: 42, connect_secs: 7 });
    assert_eq!(cfg.timeouts.request(), Duration::from_secs(42));
}

#[test]
fn blank_and_malformed_values_fall_back() {
    let cfg = SearchConfig::from_lookup(lookup(&[
        ("RAWG_API_KEY", "   "),
        ("COVERBOARD_OPENLIBRARY_BASE_URL", ""),
        ("COVERBOARD_SEARCH_TIMEOUT_SECS", "soon"),
    ]));
    assert_eq!(cfg.rawg_api_key, None);
    assert_eq!(cfg.openlibrary_base_url, DEFAULT_OPENLIBRARY_BASE_URL);
    assert_eq!(cfg.timeouts.request_secs, DEFAULT_SEARCH_REQUEST_TIMEOUT_SECS);
}
