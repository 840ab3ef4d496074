//! Stream-URL extraction from player markup and script text.
//!
//! Players on the source site reference their HLS master playlist in inline
//! script. This is a plain text scan: rules are tried in order and the first
//! capture wins.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::fetch::FetchGuard;
use crate::utils::compile_static_regex;

/// Ordered manifest-reference rules; the first capture group is the URL.
static STREAM_RULES: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        compile_static_regex(r#"(?i)file\s*:\s*["']([^"']+\.m3u8[^"']*)["']"#),
        compile_static_regex(r#"(?i)source\s*=\s*["']([^"']+\.m3u8[^"']*)["']"#),
    ]
});

/// Returns the first stream manifest URL referenced in `text`.
#[must_use]
pub fn extract_stream_url(text: &str) -> Option<String> {
    STREAM_RULES.iter().find_map(|rule| {
        rule.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Fetches `page_url` through the guard and scans it for a manifest URL.
///
/// Fetch failures and pages without a manifest both yield `None`.
pub async fn extract_from_url(fetch: &FetchGuard, page_url: &str) -> Option<String> {
    let page = fetch.fetch_soft(page_url).await?;
    let manifest = extract_stream_url(&page.body);
    debug!(page_url, found = manifest.is_some(), "Scanned page for stream manifest");
    manifest
}
