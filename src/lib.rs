//! Episode Tracker Core Library
//!
//! Follows ongoing series on a streaming site and records new episodes as
//! they are published, each with the most durable playable link that can be
//! found for it.
//!
//! # Architecture
//!
//! - [`scheduler`] - periodic and on-demand sweep triggering, one sweep at a time
//! - [`discovery`] - per-entry episode probing and the sweep commit
//! - [`resolver`] - ordered link strategies over a fetched episode page
//! - [`extract`] - stream manifest extraction from player markup
//! - [`fetch`] - the guarded HTTP client every request goes through
//! - [`store`] - whole-collection persistence (memory or `SQLite`)
//! - [`library`] - series registration, removal and trending order
//! - [`metadata`] - series page scraping at registration time
//! - [`notify`] - operator alerts

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod discovery;
pub mod extract;
pub mod fetch;
pub mod library;
pub mod metadata;
pub mod model;
pub mod notify;
pub mod resolver;
pub mod scheduler;
pub mod store;
pub mod user_agent;
pub mod utils;

// Re-export commonly used types
pub use discovery::{
    DEFAULT_BUFFER_WINDOW, DEFAULT_EPISODE_URL_TEMPLATE, DEFAULT_MAX_CONSECUTIVE_FAILURES,
    DEFAULT_LOOKUP_DELAY, DiscoveryEngine, DiscoveryError, DiscoveryPolicy, EntryOutcome,
    EpisodeUrlPattern, StopReason, SweepReport,
};
pub use extract::{extract_from_url, extract_stream_url};
pub use fetch::{
    DEFAULT_FETCH_TIMEOUT, DEFAULT_STATUS_CEILING, FetchConfig, FetchError, FetchGuard,
    FetchOptions, FetchedPage,
};
pub use library::{
    LibraryError, LibraryStats, RegisterRequest, RegisteredSeries, RemovedSeries, TrackingRequest,
};
pub use metadata::{MetadataEnricher, MetadataError, PageMetadataEnricher, SeriesMetadata};
pub use model::{EpisodeRecord, SeasonRecord, SeriesRecord, TrackingEntry};
pub use notify::{AlertLevel, LogNotifier, Notifier};
pub use resolver::{
    DEFAULT_PREFERRED_LANGUAGE, DEFAULT_TRUSTED_EMBED_HOSTS, EmbedIframeStrategy,
    EmbeddedDataStrategy, EpisodePage, EpisodeResolver, LinkPipeline, LinkStrategy,
    PipelineOptions, ResolveError, ResolvedLink, build_default_pipeline, unshorten,
};
pub use scheduler::{DEFAULT_SWEEP_INTERVAL, SchedulerState, SweepOutcome, TrackerScheduler};
pub use store::{
    Collection, MemoryStore, SWEEP_LEASE, SqliteStore, Store, StoreError, append_record,
    read_records, write_records,
};
