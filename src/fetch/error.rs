//! Error types for guarded fetches.
//!
//! Every variant except [`FetchError::ClientBuild`] is a soft failure: the
//! caller treats it as "no result" and moves on.

use thiserror::Error;

/// Reasons a guarded fetch produced no page.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// The request exceeded the configured timeout.
    #[error("request to '{url}' timed out")]
    Timeout {
        /// The URL that was requested
        url: String,
    },

    /// Connection, TLS, proxy or redirect failure.
    #[error("transport error fetching '{url}': {reason}")]
    Transport {
        /// The URL that was requested
        url: String,
        /// Underlying transport failure
        reason: String,
    },

    /// The response status was at or above the caller's ceiling.
    #[error("'{url}' answered with rejected status {status}")]
    Status {
        /// The URL that was requested
        url: String,
        /// HTTP status code received
        status: u16,
    },

    /// The response body could not be read as text.
    #[error("failed to read body of '{url}': {reason}")]
    Body {
        /// The URL that was requested
        url: String,
        /// Why reading failed
        reason: String,
    },

    /// The HTTP client itself could not be constructed.
    #[error("HTTP client construction failed: {reason}\n  Suggestion: {suggestion}")]
    ClientBuild {
        /// Why construction failed
        reason: String,
        /// How to fix the issue
        suggestion: String,
    },
}

impl FetchError {
    /// Maps a transport-level `reqwest` error onto a soft-failure kind.
    #[must_use]
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if error.is_body() || error.is_decode() {
            Self::Body {
                url: url.to_string(),
                reason: error.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                reason: error.to_string(),
            }
        }
    }

    /// Creates a `Status` error.
    #[must_use]
    pub fn status(url: &str, status: u16) -> Self {
        Self::Status {
            url: url.to_string(),
            status,
        }
    }

    /// Creates a `ClientBuild` error.
    #[must_use]
    pub fn client_build(reason: &str) -> Self {
        Self::ClientBuild {
            reason: reason.to_string(),
            suggestion: "Check the configured proxy URL and referer".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_status_message() {
        let err = FetchError::status("https://site.test/ep", 404);
        let msg = err.to_string();
        assert!(msg.contains("404"));
        assert!(msg.contains("site.test/ep"));
    }

    #[test]
    fn test_fetch_error_client_build_has_suggestion() {
        let err = FetchError::client_build("bad proxy");
        assert!(err.to_string().contains("Suggestion"));
    }

    #[test]
    fn test_fetch_error_timeout_message() {
        let err = FetchError::Timeout {
            url: "https://site.test".to_string(),
        };
        assert!(err.to_string().contains("timed out"));
    }
}
