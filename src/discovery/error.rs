//! Error types for discovery sweeps.

use thiserror::Error;

use crate::store::StoreError;

/// Hard failures that abort a sweep.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The store could not be read or written.
    #[error("sweep aborted: {0}")]
    Store(#[from] StoreError),

    /// The episode URL template is unusable.
    #[error("invalid episode URL template '{template}': {reason}")]
    InvalidUrlPattern {
        /// The rejected template
        template: String,
        /// What is wrong with it
        reason: String,
    },
}

impl DiscoveryError {
    /// Creates an `InvalidUrlPattern` error.
    #[must_use]
    pub fn invalid_url_pattern(template: &str, reason: &str) -> Self {
        Self::InvalidUrlPattern {
            template: template.to_string(),
            reason: reason.to_string(),
        }
    }
}
