//! Shared fixtures for integration tests.

#![allow(dead_code)]

pub mod socket_guard;

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracker_core::{
    AlertLevel, Collection, DiscoveryPolicy, EpisodeResolver, FetchConfig, FetchGuard,
    MemoryStore, Notifier, SeriesRecord, Store, StoreError, TrackingEntry,
};

/// Guard with a short timeout for mock servers.
pub fn fetch_guard() -> FetchGuard {
    let config = FetchConfig {
        timeout: Duration::from_secs(3),
        ..FetchConfig::default()
    };
    FetchGuard::new(&config).unwrap()
}

/// Default policy without pacing.
pub fn fast_policy() -> DiscoveryPolicy {
    DiscoveryPolicy {
        lookup_delay: Duration::ZERO,
        ..DiscoveryPolicy::default()
    }
}

/// Resolves episode URLs whose number is in `available`; records every call.
///
/// Episode numbers are read from the `{season}x{episode}/` tail of the
/// default URL pattern.
pub struct ScriptedResolver {
    available: HashSet<u32>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedResolver {
    pub fn new(available: impl IntoIterator<Item = u32>) -> Self {
        Self {
            available: available.into_iter().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn requested_episodes(&self) -> Vec<u32> {
        self.calls()
            .iter()
            .filter_map(|url| episode_number(url))
            .collect()
    }
}

pub fn episode_number(url: &str) -> Option<u32> {
    url.trim_end_matches('/').rsplit('x').next()?.parse().ok()
}

#[async_trait]
impl EpisodeResolver for ScriptedResolver {
    async fn resolve_episode(&self, episode_url: &str) -> Option<String> {
        self.calls.lock().unwrap().push(episode_url.to_string());
        let number = episode_number(episode_url)?;
        self.available
            .contains(&number)
            .then(|| format!("https://cdn.test/hls/{number}/master.m3u8"))
    }
}

/// Notifier that keeps every alert.
#[derive(Default)]
pub struct RecordingNotifier {
    alerts: Mutex<Vec<(String, String, AlertLevel)>>,
}

impl RecordingNotifier {
    pub fn alerts(&self) -> Vec<(String, String, AlertLevel)> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn count(&self, level: AlertLevel) -> usize {
        self.alerts().iter().filter(|(_, _, l)| *l == level).count()
    }
}

impl Notifier for RecordingNotifier {
    fn alert(&self, title: &str, message: &str, level: AlertLevel) {
        self.alerts
            .lock()
            .unwrap()
            .push((title.to_string(), message.to_string(), level));
    }
}

/// Store whose every operation fails.
pub struct UnavailableStore;

#[async_trait]
impl Store for UnavailableStore {
    async fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::unavailable(collection.as_str(), "connection refused"))
    }

    async fn write(&self, collection: Collection, _records: Vec<Value>) -> Result<(), StoreError> {
        Err(StoreError::unavailable(collection.as_str(), "connection refused"))
    }

    async fn append(&self, collection: Collection, _record: Value) -> Result<(), StoreError> {
        Err(StoreError::unavailable(collection.as_str(), "connection refused"))
    }
}

/// Memory store that rejects writes.
#[derive(Default)]
pub struct ReadOnlyStore {
    pub inner: MemoryStore,
}

#[async_trait]
impl Store for ReadOnlyStore {
    async fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        self.inner.read(collection).await
    }

    async fn write(&self, collection: Collection, _records: Vec<Value>) -> Result<(), StoreError> {
        Err(StoreError::unavailable(collection.as_str(), "read-only"))
    }

    async fn append(&self, collection: Collection, record: Value) -> Result<(), StoreError> {
        self.inner.append(collection, record).await
    }
}

pub fn series(id: &str, slug: &str) -> SeriesRecord {
    SeriesRecord {
        id: id.to_string(),
        slug: slug.to_string(),
        title: slug.replace('-', " "),
        description: String::new(),
        thumbnail: String::new(),
        genres: Vec::new(),
        kind: Some("TV".to_string()),
        total_episodes: None,
        seasons: Vec::new(),
    }
}

pub fn tracking(series: &SeriesRecord, season: u32, last_episode: u32) -> TrackingEntry {
    TrackingEntry {
        id: format!("{}-s{season}", series.id),
        library_id: series.id.clone(),
        title: series.title.clone(),
        slug: series.slug.clone(),
        season,
        last_episode,
        target_episode: None,
        total_episodes: None,
        last_checked_at: None,
        completed: false,
        source_url: None,
    }
}
