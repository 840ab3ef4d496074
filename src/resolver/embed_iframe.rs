//! Embed-iframe fallback.
//!
//! Used when a page has no link payload: walks `<iframe src=...>` tags whose
//! source contains a trusted player host marker and asks each one for a
//! stream manifest.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, instrument};
use url::Url;

use crate::extract::extract_from_url;
use crate::fetch::FetchGuard;
use crate::utils::{absolutize_url, compile_static_regex};

use super::{EpisodePage, LinkStrategy, ResolvedLink};

static IFRAME_SRC_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"(?i)<iframe[^>]+src=["']([^"']+)["']"#));

/// Strategy that tries trusted player iframes in document order.
#[derive(Debug, Clone)]
pub struct EmbedIframeStrategy {
    fetch: FetchGuard,
    trusted_hosts: Vec<String>,
}

impl EmbedIframeStrategy {
    /// Creates the strategy with the given host markers.
    #[must_use]
    pub fn new(fetch: FetchGuard, trusted_hosts: Vec<String>) -> Self {
        Self {
            fetch,
            trusted_hosts,
        }
    }

    /// Returns the absolute sources of trusted iframes in `body`, in order.
    #[must_use]
    pub fn trusted_sources(&self, body: &str, page_url: &str) -> Vec<String> {
        let base = Url::parse(page_url).ok();
        IFRAME_SRC_RE
            .captures_iter(body)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim()))
            .filter(|src| self.is_trusted(src))
            .filter_map(|src| match &base {
                Some(base) => absolutize_url(src, base),
                None => Some(src.to_string()),
            })
            .collect()
    }

    fn is_trusted(&self, src: &str) -> bool {
        self.trusted_hosts
            .iter()
            .any(|marker| !marker.is_empty() && src.contains(marker.as_str()))
    }
}

#[async_trait]
impl LinkStrategy for EmbedIframeStrategy {
    fn name(&self) -> &'static str {
        "embed-iframe"
    }

    #[instrument(skip(self, page), fields(strategy = "embed-iframe", page = %page.url))]
    async fn attempt(&self, page: &EpisodePage) -> Option<ResolvedLink> {
        let mut link = ResolvedLink::default();
        for src in self.trusted_sources(&page.body, &page.url) {
            debug!(src = %src, "Trying trusted iframe");
            let manifest = extract_from_url(&self.fetch, &src).await;
            link.resolved_embed_url = Some(src);
            if manifest.is_some() {
                link.stream_manifest_url = manifest;
                break;
            }
        }

        if link.is_empty() { None } else { Some(link) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fetch::FetchConfig;
    use crate::resolver::DEFAULT_TRUSTED_EMBED_HOSTS;

    fn strategy() -> EmbedIframeStrategy {
        EmbedIframeStrategy::new(
            FetchGuard::new(&FetchConfig::default()).unwrap(),
            DEFAULT_TRUSTED_EMBED_HOSTS
                .iter()
                .map(ToString::to_string)
                .collect(),
        )
    }

    #[test]
    fn test_trusted_sources_filters_untrusted_hosts() {
        let body = r#"
            <iframe width="560" src="https://ads.test/banner"></iframe>
            <iframe allowfullscreen src="https://zephyrflick.test/e/abc"></iframe>
            <IFRAME SRC='https://cdn.test/player/v/9'></IFRAME>
        "#;
        let sources = strategy().trusted_sources(body, "https://site.test/episode/x-1x1/");
        assert_eq!(
            sources,
            vec![
                "https://zephyrflick.test/e/abc".to_string(),
                "https://cdn.test/player/v/9".to_string(),
            ]
        );
    }

    #[test]
    fn test_trusted_sources_absolutizes_protocol_relative() {
        let body = r#"<iframe src="//oxaam.test/embed/7"></iframe>"#;
        let sources = strategy().trusted_sources(body, "https://site.test/episode/x-1x1/");
        assert_eq!(sources, vec!["https://oxaam.test/embed/7".to_string()]);
    }

    #[test]
    fn test_trusted_sources_empty_marker_never_matches() {
        let strategy = EmbedIframeStrategy::new(
            FetchGuard::new(&FetchConfig::default()).unwrap(),
            vec![String::new()],
        );
        let body = r#"<iframe src="https://anything.test/"></iframe>"#;
        assert!(strategy.trusted_sources(body, "https://site.test/").is_empty());
    }
}
