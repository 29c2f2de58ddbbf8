use std::time::Duration;

use chrono::Utc;
use url::Url;

// checking validity of the source url, only web schemes can be resolved
pub fn parse_source_url(url: &str) -> Option<Url> {
    Url::parse(url)
        .ok()
        .filter(|parsed| matches!(parsed.scheme(), "http" | "https"))
}

pub fn unix_now() -> i64 {
    Utc::now().timestamp()
}

// saturates instead of wrapping into the past
pub fn expires_at(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|secs| unix_now().checked_add(secs))
        .unwrap_or(i64::MAX)
}

/// Shortens a URL for log output. Download links carry signed query strings.
pub fn truncate_for_log(url: &str) -> String {
    const MAX: usize = 50;
    match url.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &url[..idx]),
        None => url.to_string(),
    }
}
