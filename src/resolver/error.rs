//! Error types for link resolution.
//!
//! Both variants are soft: the discovery loop counts them as a failed lookup.

use thiserror::Error;

use crate::fetch::FetchError;

/// Reasons an episode page produced no playable link.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// The episode page itself could not be fetched.
    #[error("episode page '{url}' unavailable: {source}")]
    PageUnavailable {
        /// The episode page URL
        url: String,
        /// Underlying fetch failure
        #[source]
        source: FetchError,
    },

    /// The page loaded but no strategy found a link.
    #[error("no playable link on '{url}': tried {tried_count} strategy(ies)")]
    NoLink {
        /// The episode page URL
        url: String,
        /// Number of strategies that were tried
        tried_count: usize,
    },
}

impl ResolveError {
    /// Creates a `PageUnavailable` error.
    #[must_use]
    pub fn page_unavailable(url: &str, source: FetchError) -> Self {
        Self::PageUnavailable {
            url: url.to_string(),
            source,
        }
    }

    /// Creates a `NoLink` error.
    #[must_use]
    pub fn no_link(url: &str, tried_count: usize) -> Self {
        Self::NoLink {
            url: url.to_string(),
            tried_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_error_no_link_message() {
        let err = ResolveError::no_link("https://site.test/episode/x-1x2/", 2);
        let msg = err.to_string();
        assert!(msg.contains("2 strategy(ies)"));
        assert!(msg.contains("x-1x2"));
    }

    #[test]
    fn test_resolve_error_page_unavailable_keeps_source() {
        let err = ResolveError::page_unavailable(
            "https://site.test/ep",
            FetchError::status("https://site.test/ep", 404),
        );
        assert!(err.to_string().contains("404"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
