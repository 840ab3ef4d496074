//! Library and tracking records shared by the discovery engine and the store.
//!
//! Field names on the wire follow the persisted JSON layout (`libraryId`,
//! `lastEpisode`, `dateAdded`, ...) so existing collections load unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// One series/season under automatic episode discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingEntry {
    /// Entry identifier (numeric ids from older records are read as strings).
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Owning [`SeriesRecord::id`].
    pub library_id: String,
    /// Display title.
    pub title: String,
    /// Site slug used to build episode page URLs.
    pub slug: String,
    /// Season number being tracked.
    pub season: u32,
    /// Highest episode number known to exist; never decreases.
    pub last_episode: u32,
    /// Episode at which tracking completes.
    #[serde(default)]
    pub target_episode: Option<u32>,
    /// Known episode count of the series, if any.
    #[serde(default)]
    pub total_episodes: Option<u32>,
    /// When a lookup last found a new episode.
    #[serde(default, rename = "lastChecked")]
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Set once `target_episode` has been reached.
    #[serde(default)]
    pub completed: bool,
    /// Series page the entry was registered from.
    #[serde(default, rename = "url", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl TrackingEntry {
    /// Target episode, treating `0` as unset.
    #[must_use]
    pub fn target(&self) -> Option<u32> {
        self.target_episode.filter(|n| *n > 0)
    }

    /// Known total episode count, treating `0` as unknown.
    #[must_use]
    pub fn total(&self) -> Option<u32> {
        self.total_episodes.filter(|n| *n > 0)
    }
}

/// A series in the library with its discovered episodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesRecord {
    /// Library identifier.
    pub id: String,
    /// Site slug.
    pub slug: String,
    /// Display title.
    pub title: String,
    /// Synopsis.
    #[serde(default)]
    pub description: String,
    /// Poster image URL or path.
    #[serde(default)]
    pub thumbnail: String,
    /// Genre labels.
    #[serde(default)]
    pub genres: Vec<String>,
    /// Release kind (e.g. `TV`, `Movie`).
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Known episode count, if any.
    #[serde(default)]
    pub total_episodes: Option<u32>,
    /// Seasons, unique by season number.
    #[serde(default)]
    pub seasons: Vec<SeasonRecord>,
}

impl SeriesRecord {
    /// Returns the season record for `season`, if present.
    #[must_use]
    pub fn season(&self, season: u32) -> Option<&SeasonRecord> {
        self.seasons.iter().find(|s| s.season == season)
    }

    /// Returns the season record for `season`, inserting an empty one if absent.
    pub fn season_mut_or_insert(&mut self, season: u32) -> &mut SeasonRecord {
        let index = match self.seasons.iter().position(|s| s.season == season) {
            Some(index) => index,
            None => {
                self.seasons.push(SeasonRecord::new(season));
                self.seasons.len() - 1
            }
        };
        &mut self.seasons[index]
    }

    /// Total number of episodes across all seasons.
    #[must_use]
    pub fn episode_count(&self) -> usize {
        self.seasons.iter().map(|s| s.episodes.len()).sum()
    }
}

/// Episodes of one season.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRecord {
    /// Season number.
    pub season: u32,
    /// Discovered episodes, unique by number.
    #[serde(default)]
    pub episodes: Vec<EpisodeRecord>,
}

impl SeasonRecord {
    /// Creates an empty season.
    #[must_use]
    pub fn new(season: u32) -> Self {
        Self {
            season,
            episodes: Vec::new(),
        }
    }

    /// Returns the episode with `number`, if present.
    #[must_use]
    pub fn episode(&self, number: u32) -> Option<&EpisodeRecord> {
        self.episodes.iter().find(|e| e.number == number)
    }

    /// Returns true if an episode with `number` exists.
    #[must_use]
    pub fn contains(&self, number: u32) -> bool {
        self.episode(number).is_some()
    }

    /// Appends `episode` unless its number is already present.
    ///
    /// Existing records are never replaced; returns false on a duplicate.
    pub fn push_episode(&mut self, episode: EpisodeRecord) -> bool {
        if self.contains(episode.number) {
            return false;
        }
        self.episodes.push(episode);
        true
    }
}

/// A discovered episode and its best playable link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Episode number within the season.
    pub number: u32,
    /// Best link found at discovery time.
    pub url: String,
    /// Discovery time.
    #[serde(rename = "dateAdded")]
    pub added_at: DateTime<Utc>,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
