//! Integration tests for series registration with scraped metadata.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracker_core::library::{library_stats, register_series, remove_series};
use tracker_core::{
    Collection, DiscoveryEngine, LibraryError, MemoryStore, MetadataEnricher, MetadataError,
    PageMetadataEnricher, RegisterRequest, SeriesRecord, SqliteStore, TrackingEntry,
    TrackingRequest, read_records,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;
use support::{RecordingNotifier, ScriptedResolver, fast_policy, fetch_guard};

const SERIES_PAGE: &str = r#"
<html>
  <body>
    <h1 class="site-title">WatchAnimeWorld</h1>
    <article>
      <h1 class="entry-title">  jujutsu KAISEN  </h1>
      <div class="genres">
        <a href="/genre/action/">Action</a>
        <a href="/genre/supernatural/">Supernatural</a>
      </div>
      <a href="/category/hindi/" rel="category tag">Hindi Dub</a>
    </article>
  </body>
</html>
"#;

async fn mount_series_page(server: &MockServer) -> String {
    Mock::given(method("GET"))
        .and(path("/series/jujutsu-kaisen/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SERIES_PAGE))
        .mount(server)
        .await;
    format!("{}/series/jujutsu-kaisen/", server.uri())
}

#[tokio::test]
async fn test_page_enricher_scrapes_series_page() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/series/jujutsu-kaisen/"))
        .and(header("Accept", "*/*"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SERIES_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let enricher = PageMetadataEnricher::new(fetch_guard());
    let metadata = enricher
        .fetch_details(&format!("{}/series/jujutsu-kaisen/", server.uri()))
        .await
        .unwrap();

    assert_eq!(metadata.slug, "jujutsu-kaisen");
    assert_eq!(metadata.title, "Jujutsu Kaisen");
    assert_eq!(metadata.genres, vec!["Action", "Supernatural", "Hindi Dub"]);
    assert_eq!(metadata.description, "No description available.");
    assert_eq!(metadata.thumbnail, "/uploads/default.jpg");
    assert_eq!(metadata.total_episodes, None);
}

#[tokio::test]
async fn test_page_enricher_fails_on_missing_page() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let enricher = PageMetadataEnricher::new(fetch_guard());
    let err = enricher
        .fetch_details(&format!("{}/series/missing/", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, MetadataError::PageUnavailable { .. }));
}

#[tokio::test]
async fn test_register_then_sweep_then_remove() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let url = mount_series_page(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::open(&dir.path().join("tracker.db")).await.unwrap());
    let enricher = PageMetadataEnricher::new(fetch_guard());

    let request = RegisterRequest {
        series_url: url.clone(),
        kind: None,
        seasons: vec![
            TrackingRequest { season: 1, start: 1, end: Some(3) },
            TrackingRequest { season: 2, start: 4, end: None },
        ],
    };
    let registered = register_series(store.as_ref(), &enricher, &request).await.unwrap();
    assert!(registered.created);
    assert_eq!(registered.entries_added, 2);
    assert_eq!(registered.title, "Jujutsu Kaisen");

    let queue: Vec<TrackingEntry> = read_records(store.as_ref(), Collection::TrackerQueue)
        .await
        .unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[1].last_episode, 3);
    assert_eq!(queue[1].target_episode, Some(4));
    assert_eq!(queue[0].source_url.as_deref(), Some(url.as_str()));

    let resolver = Arc::new(ScriptedResolver::new(1..=10));
    let notifier = Arc::new(RecordingNotifier::default());
    let report = DiscoveryEngine::new(store.clone(), resolver.clone(), notifier.clone())
        .with_policy(fast_policy())
        .run_sweep(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.episodes_found, 4);
    assert_eq!(report.completed_titles.len(), 2);

    let stats = library_stats(store.as_ref()).await.unwrap();
    assert_eq!(stats.series, 1);
    assert_eq!(stats.episodes, 4);
    assert_eq!(stats.completed, 2);

    let removed = remove_series(store.as_ref(), &registered.series_id).await.unwrap();
    assert!(removed.series_removed);
    assert_eq!(removed.entries_removed, 2);
    let library: Vec<SeriesRecord> = read_records(store.as_ref(), Collection::Library)
        .await
        .unwrap();
    assert!(library.is_empty());
}

#[tokio::test]
async fn test_reregistering_existing_series_rearms_tracking() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let url = mount_series_page(&server).await;
    let store = MemoryStore::new();
    let enricher = PageMetadataEnricher::new(fetch_guard());
    let first = RegisterRequest {
        series_url: url.clone(),
        kind: None,
        seasons: vec![TrackingRequest { season: 1, start: 1, end: Some(2) }],
    };
    let created = register_series(&store, &enricher, &first).await.unwrap();

    let second = RegisterRequest {
        series_url: url,
        kind: Some("Movie".to_string()),
        seasons: vec![
            TrackingRequest { season: 1, start: 10, end: Some(12) },
            TrackingRequest { season: 3, start: 1, end: None },
        ],
    };
    let updated = register_series(&store, &enricher, &second).await.unwrap();

    assert!(!updated.created);
    assert_eq!(updated.series_id, created.series_id);
    assert_eq!(updated.entries_reset, 1);
    assert_eq!(updated.entries_added, 1);

    let library: Vec<SeriesRecord> = read_records(&store, Collection::Library).await.unwrap();
    assert_eq!(library.len(), 1);
    assert_eq!(library[0].kind.as_deref(), Some("Movie"));
    let seasons: Vec<u32> = library[0].seasons.iter().map(|s| s.season).collect();
    assert_eq!(seasons, vec![1, 3]);

    let queue: Vec<TrackingEntry> = read_records(&store, Collection::TrackerQueue).await.unwrap();
    assert_eq!(queue.len(), 2);
    assert_eq!(queue[0].last_episode, 9);
    assert_eq!(queue[0].target_episode, Some(12));
}

#[tokio::test]
async fn test_register_with_unreachable_page_leaves_store_untouched() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let store = MemoryStore::new();
    let request = RegisterRequest {
        series_url: format!("{}/series/down/", server.uri()),
        kind: None,
        seasons: vec![TrackingRequest { season: 1, start: 1, end: None }],
    };

    let err = register_series(&store, &PageMetadataEnricher::new(fetch_guard()), &request)
        .await
        .unwrap_err();

    assert!(matches!(err, LibraryError::Metadata(_)));
    assert_eq!(store.write_count(Collection::Library).await, 0);
    assert!(library_stats(&store).await.unwrap().tracking == 0);
}
