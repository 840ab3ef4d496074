//! Collection store consumed by the discovery engine and registration.
//!
//! The store exposes whole-collection semantics only: read every record,
//! replace every record, or append one. There is no partial-update API;
//! callers read once, mutate in memory and write back once.
//!
//! # Overview
//!
//! - [`Store`] - Async trait implemented by storage backends
//! - [`Collection`] - The logical collections (`anime_library`, `tracker_queue`, `trending`)
//! - [`MemoryStore`] - In-process backend for tests and dry runs
//! - [`SqliteStore`] - `SQLite` backend holding one JSON document per collection
//!
//! Stores also hold the sweep lease: a single expiring claim that keeps two
//! processes sharing one database from sweeping at the same time.

mod error;
mod memory;
mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Label used in errors raised by lease operations.
pub const SWEEP_LEASE: &str = "sweep_lease";

/// Logical collections held by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Series library ([`crate::model::SeriesRecord`]).
    Library,
    /// Tracking queue ([`crate::model::TrackingEntry`]).
    TrackerQueue,
    /// Ranked series ids; not used by discovery.
    Trending,
}

impl Collection {
    /// Stable storage name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Library => "anime_library",
            Self::TrackerQueue => "tracker_queue",
            Self::Trending => "trending",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whole-collection record storage.
///
/// # Object Safety
///
/// Uses `async_trait` so the engine can hold an `Arc<dyn Store>`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns every record of `collection` (empty if never written).
    async fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError>;

    /// Replaces every record of `collection`.
    async fn write(&self, collection: Collection, records: Vec<Value>) -> Result<(), StoreError>;

    /// Appends one record to `collection`.
    async fn append(&self, collection: Collection, record: Value) -> Result<(), StoreError>;

    /// Takes or renews the sweep lease for `holder`, valid for `ttl`.
    ///
    /// Returns `false` while another holder's lease has not expired.
    /// Backends only reachable from one process may rely on the scheduler's
    /// in-process guard and always grant it.
    async fn acquire_sweep_lease(&self, holder: &str, ttl: Duration) -> Result<bool, StoreError> {
        let _ = (holder, ttl);
        Ok(true)
    }

    /// Drops the sweep lease if `holder` still owns it.
    async fn release_sweep_lease(&self, holder: &str) -> Result<(), StoreError> {
        let _ = holder;
        Ok(())
    }
}

/// Reads and decodes every record of `collection`.
///
/// # Errors
///
/// Returns the store's error, or [`StoreError::Corrupt`] if a record does not decode.
pub async fn read_records<T: DeserializeOwned>(
    store: &dyn Store,
    collection: Collection,
) -> Result<Vec<T>, StoreError> {
    store
        .read(collection)
        .await?
        .into_iter()
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|error| StoreError::corrupt(collection.as_str(), error))
        })
        .collect()
}

/// Encodes and writes `records` as the whole of `collection`.
///
/// # Errors
///
/// Returns the store's error, or [`StoreError::Corrupt`] if a record does not encode.
pub async fn write_records<T: Serialize>(
    store: &dyn Store,
    collection: Collection,
    records: &[T],
) -> Result<(), StoreError> {
    let values = records
        .iter()
        .map(|record| {
            serde_json::to_value(record)
                .map_err(|error| StoreError::corrupt(collection.as_str(), error))
        })
        .collect::<Result<Vec<_>, _>>()?;
    store.write(collection, values).await
}

/// Encodes and appends one record to `collection`.
///
/// # Errors
///
/// Returns the store's error, or [`StoreError::Corrupt`] if the record does not encode.
pub async fn append_record<T: Serialize>(
    store: &dyn Store,
    collection: Collection,
    record: &T,
) -> Result<(), StoreError> {
    let value = serde_json::to_value(record)
        .map_err(|error| StoreError::corrupt(collection.as_str(), error))?;
    store.append(collection, value).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::SeasonRecord;

    #[test]
    fn test_collection_names() {
        assert_eq!(Collection::Library.as_str(), "anime_library");
        assert_eq!(Collection::TrackerQueue.to_string(), "tracker_queue");
        assert_eq!(Collection::Trending.as_str(), "trending");
    }

    #[tokio::test]
    async fn test_typed_helpers_round_trip_through_store() {
        let store = MemoryStore::new();
        write_records(&store, Collection::Library, &[SeasonRecord::new(1)])
            .await
            .unwrap();
        append_record(&store, Collection::Library, &SeasonRecord::new(2))
            .await
            .unwrap();
        let seasons: Vec<SeasonRecord> = read_records(&store, Collection::Library).await.unwrap();
        assert_eq!(seasons, vec![SeasonRecord::new(1), SeasonRecord::new(2)]);
    }

    #[tokio::test]
    async fn test_read_records_reports_corrupt_collection() {
        let store = MemoryStore::new();
        store
            .write(Collection::TrackerQueue, vec![serde_json::json!({"bogus": true})])
            .await
            .unwrap();
        let err = read_records::<SeasonRecord>(&store, Collection::TrackerQueue)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { collection: "tracker_queue", .. }));
    }
}
