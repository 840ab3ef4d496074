//! Library maintenance: registering series for tracking, removing them,
//! trending order and counts.

use thiserror::Error;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::metadata::{MetadataEnricher, MetadataError};
use crate::model::{SeriesRecord, TrackingEntry};
use crate::store::{
    Collection, Store, StoreError, append_record, read_records, write_records,
};

/// Kind assigned to new series when none is given.
pub const DEFAULT_SERIES_KIND: &str = "TV";

/// Errors from library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The request is malformed.
    #[error("invalid request: {reason}")]
    InvalidRequest {
        /// What is wrong
        reason: String,
    },

    /// Metadata could not be fetched.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LibraryError {
    /// Creates an `InvalidRequest` error.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }
}

/// One season to track: look up from `start`, complete at `end` (or `start`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackingRequest {
    /// Season number.
    pub season: u32,
    /// First episode to look for (at least 1).
    pub start: u32,
    /// Episode at which tracking completes.
    pub end: Option<u32>,
}

impl TrackingRequest {
    fn target(&self) -> u32 {
        self.end.unwrap_or(self.start)
    }
}

/// A series page plus the seasons to track on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Series page URL.
    pub series_url: String,
    /// Release kind; new series default to `TV`.
    pub kind: Option<String>,
    /// Seasons to track.
    pub seasons: Vec<TrackingRequest>,
}

impl RegisterRequest {
    fn validate(&self) -> Result<(), LibraryError> {
        if self.seasons.is_empty() {
            return Err(LibraryError::invalid_request("no seasons requested"));
        }
        for request in &self.seasons {
            if request.start == 0 {
                return Err(LibraryError::invalid_request(format!(
                    "season {}: start episode must be at least 1",
                    request.season
                )));
            }
            if request.target() < request.start {
                return Err(LibraryError::invalid_request(format!(
                    "season {}: end episode {} is before start episode {}",
                    request.season,
                    request.target(),
                    request.start
                )));
            }
        }
        Ok(())
    }
}

/// Outcome of [`register_series`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredSeries {
    /// Library id of the series.
    pub series_id: String,
    /// Site slug.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// The series was new to the library.
    pub created: bool,
    /// Tracking entries added.
    pub entries_added: usize,
    /// Existing tracking entries re-armed.
    pub entries_reset: usize,
}

/// Outcome of [`remove_series`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovedSeries {
    /// A library record was removed.
    pub series_removed: bool,
    /// Tracking entries removed.
    pub entries_removed: usize,
}

/// Library counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    /// Series in the library.
    pub series: usize,
    /// Episodes across every series and season.
    pub episodes: usize,
    /// Tracking entries.
    pub tracking: usize,
    /// Tracking entries that reached their target.
    pub completed: usize,
}

/// Adds a series to the library (or updates it) and arms tracking for the
/// requested seasons.
///
/// Entries already tracking the same slug and season are reset rather than
/// duplicated.
///
/// # Errors
///
/// Returns [`LibraryError::InvalidRequest`] for bad episode ranges,
/// [`LibraryError::Metadata`] if the series page cannot be scraped, or
/// [`LibraryError::Store`] on store failure.
#[instrument(skip(store, enricher, request), fields(url = %request.series_url))]
pub async fn register_series(
    store: &dyn Store,
    enricher: &dyn MetadataEnricher,
    request: &RegisterRequest,
) -> Result<RegisteredSeries, LibraryError> {
    request.validate()?;
    let metadata = enricher.fetch_details(&request.series_url).await?;

    let mut library: Vec<SeriesRecord> = read_records(store, Collection::Library).await?;
    let mut queue: Vec<TrackingEntry> = read_records(store, Collection::TrackerQueue).await?;

    let (index, created) = match library.iter().position(|s| s.slug == metadata.slug) {
        Some(index) => {
            if let Some(kind) = &request.kind {
                library[index].kind = Some(kind.clone());
            }
            (index, false)
        }
        None => {
            library.push(SeriesRecord {
                id: Uuid::new_v4().to_string(),
                slug: metadata.slug.clone(),
                title: metadata.title.clone(),
                description: metadata.description.clone(),
                thumbnail: metadata.thumbnail.clone(),
                genres: metadata.genres.clone(),
                kind: Some(
                    request
                        .kind
                        .clone()
                        .unwrap_or_else(|| DEFAULT_SERIES_KIND.to_string()),
                ),
                total_episodes: metadata.total_episodes,
                seasons: Vec::new(),
            });
            (library.len() - 1, true)
        }
    };
    let series = &mut library[index];

    let mut new_entries: Vec<TrackingEntry> = Vec::new();
    let mut entries_reset = 0;
    for season_request in &request.seasons {
        series.season_mut_or_insert(season_request.season);

        if let Some(entry) = queue
            .iter_mut()
            .chain(new_entries.iter_mut())
            .find(|e| e.slug == metadata.slug && e.season == season_request.season)
        {
            entry.last_episode = season_request.start - 1;
            entry.target_episode = Some(season_request.target());
            entry.completed = false;
            entries_reset += 1;
            continue;
        }
        new_entries.push(TrackingEntry {
            id: Uuid::new_v4().to_string(),
            library_id: series.id.clone(),
            title: metadata.title.clone(),
            slug: metadata.slug.clone(),
            season: season_request.season,
            last_episode: season_request.start - 1,
            target_episode: Some(season_request.target()),
            total_episodes: metadata.total_episodes,
            last_checked_at: None,
            completed: false,
            source_url: Some(request.series_url.clone()),
        });
    }

    let registered = RegisteredSeries {
        series_id: series.id.clone(),
        slug: series.slug.clone(),
        title: series.title.clone(),
        created,
        entries_added: new_entries.len(),
        entries_reset,
    };

    if entries_reset > 0 {
        queue.extend(new_entries);
        write_records(store, Collection::TrackerQueue, &queue).await?;
    } else {
        for entry in &new_entries {
            append_record(store, Collection::TrackerQueue, entry).await?;
        }
    }
    write_records(store, Collection::Library, &library).await?;

    info!(
        series_id = %registered.series_id,
        created = registered.created,
        added = registered.entries_added,
        reset = registered.entries_reset,
        "Series registered"
    );
    Ok(registered)
}

/// Removes a series and every tracking entry that belongs to it.
///
/// # Errors
///
/// Returns [`LibraryError::Store`] on store failure.
#[instrument(skip(store))]
pub async fn remove_series(store: &dyn Store, series_id: &str) -> Result<RemovedSeries, LibraryError> {
    let mut library: Vec<SeriesRecord> = read_records(store, Collection::Library).await?;
    let mut queue: Vec<TrackingEntry> = read_records(store, Collection::TrackerQueue).await?;

    let series_before = library.len();
    library.retain(|s| s.id != series_id);
    let entries_before = queue.len();
    queue.retain(|e| e.library_id != series_id);

    let removed = RemovedSeries {
        series_removed: library.len() < series_before,
        entries_removed: entries_before - queue.len(),
    };

    write_records(store, Collection::Library, &library).await?;
    write_records(store, Collection::TrackerQueue, &queue).await?;
    info!(
        series_removed = removed.series_removed,
        entries_removed = removed.entries_removed,
        "Series removed"
    );
    Ok(removed)
}

/// Stores the trending list: ids with a positive rank, ordered by rank.
///
/// Ties keep their input order. Returns the stored ids.
///
/// # Errors
///
/// Returns [`LibraryError::Store`] on store failure.
pub async fn set_trending(
    store: &dyn Store,
    ranks: &[(String, i64)],
) -> Result<Vec<String>, LibraryError> {
    let mut ranked: Vec<&(String, i64)> = ranks.iter().filter(|(_, rank)| *rank > 0).collect();
    ranked.sort_by_key(|(_, rank)| *rank);
    let ids: Vec<String> = ranked.into_iter().map(|(id, _)| id.clone()).collect();
    write_records(store, Collection::Trending, &ids).await?;
    Ok(ids)
}

/// Returns the trending ids in rank order.
///
/// # Errors
///
/// Returns [`LibraryError::Store`] on store failure.
pub async fn trending(store: &dyn Store) -> Result<Vec<String>, LibraryError> {
    Ok(read_records(store, Collection::Trending).await?)
}

/// Counts series, episodes and tracking entries.
///
/// # Errors
///
/// Returns [`LibraryError::Store`] on store failure.
pub async fn library_stats(store: &dyn Store) -> Result<LibraryStats, LibraryError> {
    let library: Vec<SeriesRecord> = read_records(store, Collection::Library).await?;
    let queue: Vec<TrackingEntry> = read_records(store, Collection::TrackerQueue).await?;
    Ok(LibraryStats {
        series: library.len(),
        episodes: library.iter().map(SeriesRecord::episode_count).sum(),
        tracking: queue.len(),
        completed: queue.iter().filter(|e| e.completed).count(),
    })
}
