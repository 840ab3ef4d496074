//! Integration tests for the store implementations.

use std::time::Duration;

use serde_json::json;
use tracker_core::{Collection, MemoryStore, SqliteStore, Store, StoreError};

async fn exercise_whole_collection_semantics(store: &dyn Store) {
    assert!(store.read(Collection::TrackerQueue).await.unwrap().is_empty());

    store
        .append(Collection::TrackerQueue, json!({"id": "a"}))
        .await
        .unwrap();
    store
        .append(Collection::TrackerQueue, json!({"id": "b"}))
        .await
        .unwrap();
    assert_eq!(
        store.read(Collection::TrackerQueue).await.unwrap(),
        vec![json!({"id": "a"}), json!({"id": "b"})]
    );

    store
        .write(Collection::TrackerQueue, vec![json!({"id": "c"})])
        .await
        .unwrap();
    assert_eq!(
        store.read(Collection::TrackerQueue).await.unwrap(),
        vec![json!({"id": "c"})]
    );

    store.write(Collection::TrackerQueue, Vec::new()).await.unwrap();
    assert!(store.read(Collection::TrackerQueue).await.unwrap().is_empty());
    assert!(store.read(Collection::Trending).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_memory_store_whole_collection_semantics() {
    exercise_whole_collection_semantics(&MemoryStore::new()).await;
}

#[tokio::test]
async fn test_sqlite_store_whole_collection_semantics() {
    let store = SqliteStore::in_memory().await.unwrap();
    exercise_whole_collection_semantics(&store).await;
}

#[tokio::test]
async fn test_sqlite_store_persists_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested.db");

    let store = SqliteStore::open(&path).await.unwrap();
    store
        .write(Collection::Trending, vec![json!("s2"), json!("s1")])
        .await
        .unwrap();
    store.close().await;

    let reopened = SqliteStore::open(&path).await.unwrap();
    assert_eq!(
        reopened.read(Collection::Trending).await.unwrap(),
        vec![json!("s2"), json!("s1")]
    );
}

#[tokio::test]
async fn test_sqlite_store_open_fails_when_parent_is_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let err = SqliteStore::open(&blocker.join("tracker.db")).await.unwrap_err();

    assert!(matches!(err, StoreError::Open { .. }));
}

#[tokio::test]
async fn test_sweep_lease_is_shared_between_handles_on_one_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracker.db");
    let daemon = SqliteStore::open(&path).await.unwrap();
    let cli = SqliteStore::open(&path).await.unwrap();
    let ttl = Duration::from_secs(60);

    assert!(daemon.acquire_sweep_lease("daemon", ttl).await.unwrap());
    assert!(!cli.acquire_sweep_lease("cli", ttl).await.unwrap());

    daemon.release_sweep_lease("daemon").await.unwrap();
    assert!(cli.acquire_sweep_lease("cli", ttl).await.unwrap());
}

#[tokio::test]
async fn test_memory_store_counts_writes_not_appends() {
    let store = MemoryStore::new();
    store.append(Collection::Library, json!({})).await.unwrap();
    store.write(Collection::Library, vec![json!({})]).await.unwrap();
    store.write(Collection::Library, vec![json!({})]).await.unwrap();

    assert_eq!(store.write_count(Collection::Library).await, 2);
    assert_eq!(store.write_count(Collection::TrackerQueue).await, 0);
}
