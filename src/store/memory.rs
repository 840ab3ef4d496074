//! In-process store.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{Collection, Store, StoreError};

#[derive(Debug, Default)]
struct MemoryState {
    records: HashMap<Collection, Vec<Value>>,
    writes: HashMap<Collection, usize>,
    lease: Option<(String, Instant)>,
}

/// A store that keeps collections in memory.
///
/// Counts whole-collection writes per collection so callers can verify
/// write batching. The sweep lease is honoured, so schedulers sharing one
/// instance exclude each other like separate processes sharing a database.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls made against `collection`.
    pub async fn write_count(&self, collection: Collection) -> usize {
        self.state
            .read()
            .await
            .writes
            .get(&collection)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .records
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn write(&self, collection: Collection, records: Vec<Value>) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.records.insert(collection, records);
        *state.writes.entry(collection).or_insert(0) += 1;
        Ok(())
    }

    async fn append(&self, collection: Collection, record: Value) -> Result<(), StoreError> {
        self.state
            .write()
            .await
            .records
            .entry(collection)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn acquire_sweep_lease(&self, holder: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let now = Instant::now();
        if let Some((owner, expires_at)) = &state.lease
            && owner != holder
            && *expires_at > now
        {
            return Ok(false);
        }
        state.lease = Some((holder.to_string(), now + ttl));
        Ok(true)
    }

    async fn release_sweep_lease(&self, holder: &str) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.lease.as_ref().is_some_and(|(owner, _)| owner == holder) {
            state.lease = None;
        }
        Ok(())
    }
}
