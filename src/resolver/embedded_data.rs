//! Embedded-data hunter.
//!
//! Episode pages carry their player links as a base64 JSON payload in the
//! `data` query parameter of an API-looking URL. The payload is a list of
//! `{language, link}` entries whose links are short redirect URLs; the
//! strategy picks one, unshortens it to the player embed and scans the
//! embed for a stream manifest.

use std::sync::LazyLock;

use async_trait::async_trait;
use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::extract::extract_stream_url;
use crate::fetch::FetchGuard;
use crate::utils::compile_static_regex;

use super::unshorten::follow_redirects;
use super::{EpisodePage, LinkStrategy, ResolvedLink};

/// Absolute URLs carrying a base64 `data` query parameter.
static DATA_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_static_regex(r#"(https?://[^\s"']+\?data=([A-Za-z0-9+/=]+))"#)
});

/// Markers that make a decoded payload worth parsing.
const PAYLOAD_MARKERS: [&str; 2] = ["link", "short.icu"];

/// Standard alphabet, padding optional.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One language option in a link payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LinkEntry {
    /// Audio language label.
    #[serde(default)]
    pub language: Option<String>,
    /// Short link to the player.
    #[serde(default)]
    pub link: Option<String>,
}

/// Decodes a base64 payload into its link entries.
///
/// Returns `None` when the text is not base64, does not mention a link, is
/// not a JSON array, or holds no well-formed entry. Malformed entries are
/// dropped one by one.
#[must_use]
pub fn decode_link_payload(encoded: &str) -> Option<Vec<LinkEntry>> {
    let bytes = PAYLOAD_ENGINE.decode(encoded).ok()?;
    let decoded = String::from_utf8_lossy(&bytes);
    if !PAYLOAD_MARKERS.iter().any(|marker| decoded.contains(marker)) {
        return None;
    }
    let items = match serde_json::from_str::<Vec<Value>>(&decoded) {
        Ok(items) => items,
        Err(error) => {
            debug!(error = %error, "Link payload is not a JSON list");
            return None;
        }
    };

    let entries: Vec<LinkEntry> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<LinkEntry>(item) {
            Ok(entry) => Some(entry),
            Err(error) => {
                debug!(error = %error, "Skipping malformed payload entry");
                None
            }
        })
        .collect();
    (!entries.is_empty()).then_some(entries)
}

/// Picks the entry for `preferred_language`, else the first entry, and
/// returns its link with escaped slashes normalized.
///
/// A preferred entry without a link is not skipped in favour of another.
#[must_use]
pub fn select_link(entries: &[LinkEntry], preferred_language: &str) -> Option<String> {
    let entry = entries
        .iter()
        .find(|entry| entry.language.as_deref() == Some(preferred_language))
        .or_else(|| entries.first())?;
    entry
        .link
        .as_deref()
        .filter(|link| !link.is_empty())
        .map(|link| link.replace("\\/", "/"))
}

/// Strategy that hunts base64 link payloads in the page body.
#[derive(Debug, Clone)]
pub struct EmbeddedDataStrategy {
    fetch: FetchGuard,
    preferred_language: String,
}

impl EmbeddedDataStrategy {
    /// Creates the strategy.
    #[must_use]
    pub fn new(fetch: FetchGuard, preferred_language: impl Into<String>) -> Self {
        Self {
            fetch,
            preferred_language: preferred_language.into(),
        }
    }

    fn first_payload_link(&self, body: &str) -> Option<String> {
        DATA_URL_RE.captures_iter(body).find_map(|caps| {
            let encoded = caps.get(2)?.as_str();
            let entries = decode_link_payload(encoded)?;
            select_link(&entries, &self.preferred_language)
        })
    }
}

#[async_trait]
impl LinkStrategy for EmbeddedDataStrategy {
    fn name(&self) -> &'static str {
        "embedded-data"
    }

    #[instrument(skip(self, page), fields(strategy = "embedded-data", page = %page.url))]
    async fn attempt(&self, page: &EpisodePage) -> Option<ResolvedLink> {
        let raw_link = self.first_payload_link(&page.body)?;
        debug!(raw_link = %raw_link, "Found link payload");

        let (embed_url, embed_page) = follow_redirects(&self.fetch, &raw_link).await;
        let manifest = embed_page.and_then(|embed| extract_stream_url(&embed.body));
        debug!(embed_url = %embed_url, found = manifest.is_some(), "Scanned embed page");

        Some(ResolvedLink {
            stream_manifest_url: manifest,
            resolved_embed_url: Some(embed_url),
            raw_shortened_url: Some(raw_link),
        })
    }
}
