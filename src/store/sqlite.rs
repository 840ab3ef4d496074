//! `SQLite` store: one JSON array document per collection, plus the sweep
//! lease row.
//!
//! The pool runs in WAL mode so the daemon and one-off CLI commands can share
//! a database file.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, instrument};

use super::{Collection, SWEEP_LEASE, Store, StoreError};

/// Connections per file-backed pool; `SQLite` serializes writers anyway.
const MAX_CONNECTIONS: u32 = 4;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const UPSERT_SQL: &str = r"INSERT INTO collections (name, records, updated_at)
    VALUES (?, ?, datetime('now'))
    ON CONFLICT(name) DO UPDATE SET
        records = excluded.records,
        updated_at = excluded.updated_at";

const SELECT_SQL: &str = "SELECT records FROM collections WHERE name = ?";

const ACQUIRE_LEASE_SQL: &str = r"INSERT INTO sweep_lease (id, holder, expires_at)
    VALUES (1, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        holder = excluded.holder,
        expires_at = excluded.expires_at
    WHERE sweep_lease.holder = excluded.holder OR sweep_lease.expires_at <= ?";

const RELEASE_LEASE_SQL: &str = "DELETE FROM sweep_lease WHERE id = 1 AND holder = ?";

/// A store backed by the `collections` table.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens the database file at `path`, creating it and its parent
    /// directories if needed, and applies pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] if the file cannot be created or opened,
    /// or [`StoreError::Migration`] if the schema cannot be brought up to date.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| StoreError::open(path, error))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|error| StoreError::open(path, error))?;
        info!("Tracker database opened");
        Self::migrated(pool).await
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Open`] or [`StoreError::Migration`] on setup failure.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let location = Path::new(":memory:");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|error| StoreError::open(location, error))?;
        // The database lives as long as its only connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|error| StoreError::open(location, error))?;
        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Waits for in-flight queries and closes every connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn lease_unavailable(error: &sqlx::Error) -> StoreError {
    StoreError::unavailable(SWEEP_LEASE, error.to_string())
}

fn unavailable(collection: Collection, error: &sqlx::Error) -> StoreError {
    StoreError::unavailable(collection.as_str(), error.to_string())
}

fn decode_document(collection: Collection, raw: &str) -> Result<Vec<Value>, StoreError> {
    serde_json::from_str(raw).map_err(|error| StoreError::corrupt(collection.as_str(), error))
}

fn encode_document(collection: Collection, records: &[Value]) -> Result<String, StoreError> {
    serde_json::to_string(records).map_err(|error| StoreError::corrupt(collection.as_str(), error))
}

#[async_trait]
impl Store for SqliteStore {
    #[instrument(skip(self), fields(collection = %collection))]
    async fn read(&self, collection: Collection) -> Result<Vec<Value>, StoreError> {
        let row = sqlx::query(SELECT_SQL)
            .bind(collection.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| unavailable(collection, &error))?;

        match row {
            Some(row) => {
                let raw: String = row
                    .try_get("records")
                    .map_err(|error| unavailable(collection, &error))?;
                decode_document(collection, &raw)
            }
            None => Ok(Vec::new()),
        }
    }

    #[instrument(skip(self, records), fields(collection = %collection, count = records.len()))]
    async fn write(&self, collection: Collection, records: Vec<Value>) -> Result<(), StoreError> {
        let document = encode_document(collection, &records)?;
        sqlx::query(UPSERT_SQL)
            .bind(collection.as_str())
            .bind(document)
            .execute(&self.pool)
            .await
            .map_err(|error| unavailable(collection, &error))?;
        debug!("Collection written");
        Ok(())
    }

    #[instrument(skip(self, record), fields(collection = %collection))]
    async fn append(&self, collection: Collection, record: Value) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|error| unavailable(collection, &error))?;

        let row = sqlx::query(SELECT_SQL)
            .bind(collection.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|error| unavailable(collection, &error))?;

        let mut records = match row {
            Some(row) => {
                let raw: String = row
                    .try_get("records")
                    .map_err(|error| unavailable(collection, &error))?;
                decode_document(collection, &raw)?
            }
            None => Vec::new(),
        };
        records.push(record);

        sqlx::query(UPSERT_SQL)
            .bind(collection.as_str())
            .bind(encode_document(collection, &records)?)
            .execute(&mut *tx)
            .await
            .map_err(|error| unavailable(collection, &error))?;

        tx.commit()
            .await
            .map_err(|error| unavailable(collection, &error))?;
        debug!(count = records.len(), "Record appended");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn acquire_sweep_lease(&self, holder: &str, ttl: Duration) -> Result<bool, StoreError> {
        let now = Utc::now().timestamp_millis();
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let result = sqlx::query(ACQUIRE_LEASE_SQL)
            .bind(holder)
            .bind(now.saturating_add(ttl_ms))
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|error| lease_unavailable(&error))?;
        let acquired = result.rows_affected() > 0;
        debug!(acquired, "Sweep lease requested");
        Ok(acquired)
    }

    #[instrument(skip(self))]
    async fn release_sweep_lease(&self, holder: &str) -> Result<(), StoreError> {
        sqlx::query(RELEASE_LEASE_SQL)
            .bind(holder)
            .execute(&self.pool)
            .await
            .map_err(|error| lease_unavailable(&error))?;
        Ok(())
    }
}
