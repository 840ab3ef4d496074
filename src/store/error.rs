//! Error types for store operations.

use std::path::Path;

use thiserror::Error;

/// Failures reading or writing a collection. Always a hard failure.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing storage could not be reached or refused the operation.
    #[error("store unavailable for '{collection}': {reason}")]
    Unavailable {
        /// Collection being accessed
        collection: &'static str,
        /// Backend failure
        reason: String,
    },

    /// Stored data does not match the expected record shape.
    #[error("corrupt records in '{collection}': {source}")]
    Corrupt {
        /// Collection being accessed
        collection: &'static str,
        /// Decode failure
        #[source]
        source: serde_json::Error,
    },

    /// The database file could not be created or opened.
    #[error("cannot open tracker database '{path}': {reason}")]
    Open {
        /// Database location
        path: String,
        /// Filesystem or driver failure
        reason: String,
    },

    /// Schema migrations failed.
    #[error("tracker database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Creates an `Unavailable` error.
    #[must_use]
    pub fn unavailable(collection: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            collection,
            reason: reason.into(),
        }
    }

    /// Creates an `Open` error.
    #[must_use]
    pub fn open(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Open {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Creates a `Corrupt` error.
    #[must_use]
    pub fn corrupt(collection: &'static str, source: serde_json::Error) -> Self {
        Self::Corrupt { collection, source }
    }
}
