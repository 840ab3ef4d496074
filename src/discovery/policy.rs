//! Probing policy and episode page URL construction.

use std::time::Duration;

use super::DiscoveryError;

/// Probing horizon used when neither a target nor a total is known.
pub const DEFAULT_BUFFER_WINDOW: u32 = 12;

/// Consecutive unresolved lookups that end an entry's scan for the sweep.
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

/// Pause after every networked lookup.
pub const DEFAULT_LOOKUP_DELAY: Duration = Duration::from_secs(2);

/// Episode page template of the source site.
pub const DEFAULT_EPISODE_URL_TEMPLATE: &str =
    "https://watchanimeworld.net/episode/{slug}-{season}x{episode}/";

/// Limits applied to each entry's probing loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryPolicy {
    /// Episodes past `lastEpisode` looked up when the series length is unknown.
    pub buffer_window: u32,
    /// Consecutive failures before giving up on an entry until the next sweep.
    pub max_consecutive_failures: u32,
    /// Delay after every networked lookup.
    pub lookup_delay: Duration,
}

impl Default for DiscoveryPolicy {
    fn default() -> Self {
        Self {
            buffer_window: DEFAULT_BUFFER_WINDOW,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            lookup_delay: DEFAULT_LOOKUP_DELAY,
        }
    }
}

/// Builds episode page URLs from `{slug}`, `{season}` and `{episode}` placeholders.
///
/// URLs are re-derived on every sweep, so the template must stay stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeUrlPattern {
    template: String,
}

impl EpisodeUrlPattern {
    /// Creates a pattern from `template`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidUrlPattern`] unless the template is an
    /// http(s) URL containing both `{slug}` and `{episode}`.
    pub fn new(template: impl Into<String>) -> Result<Self, DiscoveryError> {
        let template = template.into();
        if !(template.starts_with("http://") || template.starts_with("https://")) {
            return Err(DiscoveryError::invalid_url_pattern(
                &template,
                "must start with http:// or https://",
            ));
        }
        for placeholder in ["{slug}", "{episode}"] {
            if !template.contains(placeholder) {
                return Err(DiscoveryError::invalid_url_pattern(
                    &template,
                    &format!("missing {placeholder} placeholder"),
                ));
            }
        }
        Ok(Self { template })
    }

    /// Returns the page URL of one episode.
    #[must_use]
    pub fn episode_url(&self, slug: &str, season: u32, episode: u32) -> String {
        self.template
            .replace("{slug}", slug)
            .replace("{season}", &season.to_string())
            .replace("{episode}", &episode.to_string())
    }
}

impl Default for EpisodeUrlPattern {
    fn default() -> Self {
        Self {
            template: DEFAULT_EPISODE_URL_TEMPLATE.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_defaults() {
        let policy = DiscoveryPolicy::default();
        assert_eq!(policy.buffer_window, 12);
        assert_eq!(policy.max_consecutive_failures, 3);
        assert_eq!(policy.lookup_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_default_pattern_builds_site_url() {
        let pattern = EpisodeUrlPattern::default();
        assert_eq!(
            pattern.episode_url("one-piece", 2, 15),
            "https://watchanimeworld.net/episode/one-piece-2x15/"
        );
    }

    #[test]
    fn test_pattern_is_pure() {
        let pattern = EpisodeUrlPattern::new("http://127.0.0.1:9/ep/{slug}/{season}/{episode}").unwrap();
        let first = pattern.episode_url("a", 1, 2);
        assert_eq!(first, pattern.episode_url("a", 1, 2));
        assert_eq!(first, "http://127.0.0.1:9/ep/a/1/2");
    }

    #[test]
    fn test_pattern_rejects_missing_episode_placeholder() {
        let err = EpisodeUrlPattern::new("https://site.test/{slug}/").unwrap_err();
        assert!(err.to_string().contains("{episode}"));
    }

    #[test]
    fn test_pattern_rejects_non_http() {
        assert!(EpisodeUrlPattern::new("ftp://site.test/{slug}-{episode}").is_err());
    }
}
