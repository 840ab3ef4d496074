//! Episode discovery: walks every open tracking entry and looks up episode
//! pages past the last known episode.
//!
//! A sweep reads the tracking queue and the library once, checks entries
//! strictly one after another, and writes both collections back at most
//! once at the end. Lookup failures are soft: they only count towards the
//! consecutive-failure limit. Store failures are hard and abort the sweep.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use tracker_core::{
//!     DiscoveryEngine, FetchConfig, FetchGuard, LogNotifier, MemoryStore, PipelineOptions,
//!     build_default_pipeline,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetch = FetchGuard::new(&FetchConfig::default())?;
//! let pipeline = build_default_pipeline(&fetch, &PipelineOptions::default());
//! let engine = DiscoveryEngine::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(pipeline),
//!     Arc::new(LogNotifier),
//! );
//! let report = engine.run_sweep(&CancellationToken::new()).await?;
//! println!("{} new episodes", report.episodes_found);
//! # Ok(())
//! # }
//! ```

mod error;
mod policy;

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub use error::DiscoveryError;
pub use policy::{
    DEFAULT_BUFFER_WINDOW, DEFAULT_EPISODE_URL_TEMPLATE, DEFAULT_MAX_CONSECUTIVE_FAILURES,
    DEFAULT_LOOKUP_DELAY, DiscoveryPolicy, EpisodeUrlPattern,
};

use crate::model::{EpisodeRecord, SeasonRecord, SeriesRecord, TrackingEntry};
use crate::notify::{AlertLevel, Notifier};
use crate::resolver::EpisodeResolver;
use crate::store::{Collection, Store, StoreError, read_records, write_records};

/// Why probing of one entry ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// The target episode is present.
    TargetReached,
    /// Too many consecutive lookups resolved nothing.
    ConsecutiveFailures,
    /// Every episode up to the upper bound was examined.
    #[default]
    BoundExhausted,
    /// The sweep was cancelled.
    Cancelled,
}

/// Per-entry probing result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOutcome {
    /// Networked lookups made.
    pub lookups: usize,
    /// New episodes recorded.
    pub found: usize,
    /// The entry was marked completed during this sweep.
    pub completed: bool,
    /// Why the loop ended.
    pub stop: StopReason,
}

/// Summary of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Entries in the tracking queue.
    pub entries_total: usize,
    /// Entries that were checked.
    pub entries_checked: usize,
    /// Completed or orphaned entries that were skipped.
    pub entries_skipped: usize,
    /// Networked lookups across all entries.
    pub lookups: usize,
    /// New episodes recorded across all entries.
    pub episodes_found: usize,
    /// Titles of entries completed during the sweep.
    pub completed_titles: Vec<String>,
    /// Library and queue were written back.
    pub persisted: bool,
    /// The sweep stopped early on cancellation.
    pub cancelled: bool,
}

impl SweepReport {
    fn record(&mut self, entry: &TrackingEntry, outcome: &EntryOutcome) {
        self.entries_checked += 1;
        self.lookups += outcome.lookups;
        self.episodes_found += outcome.found;
        if outcome.completed {
            self.completed_titles.push(entry.title.clone());
        }
        if outcome.stop == StopReason::Cancelled {
            self.cancelled = true;
        }
    }

    fn has_changes(&self) -> bool {
        self.episodes_found > 0 || !self.completed_titles.is_empty()
    }
}

/// Runs discovery sweeps against a store.
pub struct DiscoveryEngine {
    store: Arc<dyn Store>,
    resolver: Arc<dyn EpisodeResolver>,
    notifier: Arc<dyn Notifier>,
    urls: EpisodeUrlPattern,
    policy: DiscoveryPolicy,
}

impl std::fmt::Debug for DiscoveryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryEngine")
            .field("urls", &self.urls)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl DiscoveryEngine {
    /// Creates an engine with the default policy and URL pattern.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        resolver: Arc<dyn EpisodeResolver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            resolver,
            notifier,
            urls: EpisodeUrlPattern::default(),
            policy: DiscoveryPolicy::default(),
        }
    }

    /// Replaces the probing policy.
    #[must_use]
    pub fn with_policy(mut self, policy: DiscoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the episode URL pattern.
    #[must_use]
    pub fn with_url_pattern(mut self, urls: EpisodeUrlPattern) -> Self {
        self.urls = urls;
        self
    }

    /// Returns the store the engine sweeps and holds the sweep lease in.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Checks every open tracking entry once.
    ///
    /// Cancellation is honoured between lookups; entries processed before it
    /// are still committed.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Store`] if either collection cannot be read
    /// or written back.
    #[instrument(skip_all)]
    pub async fn run_sweep(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SweepReport, DiscoveryError> {
        let mut queue: Vec<TrackingEntry> =
            read_records(self.store.as_ref(), Collection::TrackerQueue).await?;
        let mut report = SweepReport {
            entries_total: queue.len(),
            ..SweepReport::default()
        };
        if queue.is_empty() {
            debug!("Tracking queue is empty");
            return Ok(report);
        }

        let mut library: Vec<SeriesRecord> =
            read_records(self.store.as_ref(), Collection::Library).await?;
        info!(entries = queue.len(), series = library.len(), "Starting sweep");

        for entry in &mut queue {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if entry.completed {
                report.entries_skipped += 1;
                continue;
            }
            let Some(series) = library.iter_mut().find(|s| s.id == entry.library_id) else {
                warn!(
                    title = %entry.title,
                    library_id = %entry.library_id,
                    "Series no longer in library, skipping entry"
                );
                report.entries_skipped += 1;
                continue;
            };

            let season = series.season_mut_or_insert(entry.season);
            let outcome = self.scan_entry(entry, season, cancel).await;
            report.record(entry, &outcome);
            if report.cancelled {
                break;
            }
        }

        if report.has_changes() {
            self.persist(&library, &queue).await?;
            report.persisted = true;
            info!(
                found = report.episodes_found,
                completed = report.completed_titles.len(),
                "Saved sweep results"
            );
        }

        info!(
            checked = report.entries_checked,
            skipped = report.entries_skipped,
            lookups = report.lookups,
            cancelled = report.cancelled,
            "Sweep finished"
        );
        Ok(report)
    }

    #[instrument(
        skip(self, entry, season, cancel),
        fields(title = %entry.title, season = entry.season)
    )]
    async fn scan_entry(
        &self,
        entry: &mut TrackingEntry,
        season: &mut SeasonRecord,
        cancel: &CancellationToken,
    ) -> EntryOutcome {
        let mut outcome = EntryOutcome::default();

        if let Some(target) = entry.target()
            && entry.last_episode >= target
            && season.contains(target)
        {
            self.complete(entry, target);
            outcome.completed = true;
            outcome.stop = StopReason::TargetReached;
            return outcome;
        }

        let Some(mut candidate) = entry.last_episode.checked_add(1) else {
            return outcome;
        };
        let upper_bound = entry
            .target()
            .or_else(|| entry.total())
            .unwrap_or_else(|| candidate.saturating_add(self.policy.buffer_window));
        let mut consecutive_failures = 0u32;

        info!(from = candidate, to = upper_bound, "Checking entry");

        loop {
            if candidate > upper_bound {
                outcome.stop = StopReason::BoundExhausted;
                break;
            }
            if consecutive_failures >= self.policy.max_consecutive_failures {
                outcome.stop = StopReason::ConsecutiveFailures;
                break;
            }
            if cancel.is_cancelled() {
                outcome.stop = StopReason::Cancelled;
                break;
            }

            if season.contains(candidate) {
                debug!(episode = candidate, "Episode already recorded, skipping");
                entry.last_episode = entry.last_episode.max(candidate);
                if let Some(target) = reached_target(entry, candidate) {
                    self.complete(entry, target);
                    outcome.completed = true;
                    outcome.stop = StopReason::TargetReached;
                    break;
                }
                let Some(next) = candidate.checked_add(1) else {
                    break;
                };
                candidate = next;
                continue;
            }

            let episode_url = self.urls.episode_url(&entry.slug, entry.season, candidate);
            outcome.lookups += 1;

            match self.resolver.resolve_episode(&episode_url).await {
                Some(link) => {
                    let now = Utc::now();
                    season.push_episode(EpisodeRecord {
                        number: candidate,
                        url: link,
                        added_at: now,
                    });
                    entry.last_episode = entry.last_episode.max(candidate);
                    entry.last_checked_at = Some(now);
                    consecutive_failures = 0;
                    outcome.found += 1;
                    info!(episode = candidate, "Found episode");

                    if let Some(target) = reached_target(entry, candidate) {
                        self.complete(entry, target);
                        outcome.completed = true;
                        outcome.stop = StopReason::TargetReached;
                        break;
                    }
                }
                None => {
                    consecutive_failures += 1;
                    info!(episode = candidate, consecutive_failures, "Episode not found");
                }
            }

            let Some(next) = candidate.checked_add(1) else {
                break;
            };
            candidate = next;
            self.pace(cancel).await;
        }

        debug!(
            stop = ?outcome.stop,
            last_episode = entry.last_episode,
            "Entry done"
        );
        outcome
    }

    fn complete(&self, entry: &mut TrackingEntry, target: u32) {
        entry.completed = true;
        self.notifier.alert(
            "Task Complete",
            &format!("{} reached target episode {target}.", entry.title),
            AlertLevel::Success,
        );
    }

    async fn pace(&self, cancel: &CancellationToken) {
        if self.policy.lookup_delay.is_zero() {
            return;
        }
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(self.policy.lookup_delay) => {}
        }
    }

    async fn persist(
        &self,
        library: &[SeriesRecord],
        queue: &[TrackingEntry],
    ) -> Result<(), DiscoveryError> {
        let result: Result<(), StoreError> =
            match write_records(self.store.as_ref(), Collection::Library, library).await {
                Ok(()) => write_records(self.store.as_ref(), Collection::TrackerQueue, queue).await,
                Err(error) => Err(error),
            };

        if let Err(error) = result {
            self.notifier.alert(
                "Tracker Error",
                &format!("Could not save sweep results: {error}"),
                AlertLevel::Error,
            );
            return Err(error.into());
        }
        Ok(())
    }
}

fn reached_target(entry: &TrackingEntry, candidate: u32) -> Option<u32> {
    entry.target().filter(|target| candidate >= *target)
}
