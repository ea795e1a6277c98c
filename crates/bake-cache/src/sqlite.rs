//! SQLite-backed cache store.
//!
//! A single table maps content hashes to artifact paths:
//!
//! ```text
//! render_cache(
//!     content_hash  TEXT PRIMARY KEY,
//!     artifact_path TEXT,
//!     created_at    TEXT,   -- RFC 3339
//!     updated_at    TEXT,   -- RFC 3339
//! )
//! ```
//!
//! The schema is created by an embedded migration on open, so re-opening an
//! existing database keeps every prior entry.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

use crate::{CacheEntry, CacheError, CacheStore};

/// Embedded migrations, run on every open.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Batch runs are sequential; a second connection covers a concurrent
/// lookup during a multi-theme render.
const MAX_CONNECTIONS: u32 = 2;

const SELECT_ENTRY: &str = "SELECT content_hash, artifact_path, created_at, updated_at \
     FROM render_cache WHERE content_hash = ?";

const UPSERT_ENTRY: &str = "INSERT INTO render_cache (content_hash, artifact_path, created_at, updated_at) \
     VALUES (?, ?, ?, ?) \
     ON CONFLICT (content_hash) DO UPDATE SET \
         artifact_path = excluded.artifact_path, \
         updated_at = excluded.updated_at";

const DELETE_ENTRY: &str = "DELETE FROM render_cache WHERE content_hash = ?";

const COUNT_ENTRIES: &str = "SELECT COUNT(*) FROM render_cache";

#[derive(sqlx::FromRow)]
struct CacheRow {
    content_hash: String,
    artifact_path: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CacheRow> for CacheEntry {
    fn from(row: CacheRow) -> Self {
        Self {
            content_hash: row.content_hash,
            artifact_path: PathBuf::from(row.artifact_path),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// [`CacheStore`] persisted in a SQLite file.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the cache database at `path`.
    ///
    /// Parent directories are created as needed and migrations are applied.
    pub async fn open(path: &Path) -> Result<Self, CacheError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = Self::base_options()
            .filename(path)
            .create_if_missing(true);
        Self::connect(options, MAX_CONNECTIONS, path).await
    }

    /// Open a private in-memory database.
    ///
    /// Limited to one connection, otherwise each pooled connection would see
    /// its own empty database.
    pub async fn open_in_memory() -> Result<Self, CacheError> {
        let options = Self::base_options().filename(":memory:");
        Self::connect(options, 1, Path::new(":memory:")).await
    }

    async fn connect(
        options: SqliteConnectOptions,
        max_connections: u32,
        path: &Path,
    ) -> Result<Self, CacheError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|source| CacheError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        MIGRATOR.run(&pool).await?;
        tracing::debug!(path = %path.display(), "render cache opened");
        Ok(Self { pool })
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_millis(1500))
    }

    /// Number of stored entries.
    pub async fn count(&self) -> Result<i64, CacheError> {
        let (count,): (i64,) = sqlx::query_as(COUNT_ENTRIES).fetch_one(&self.pool).await?;
        Ok(count)
    }
}

fn path_to_text(path: &Path) -> Result<&str, CacheError> {
    path.to_str()
        .ok_or_else(|| CacheError::NonUtf8Path(path.to_path_buf()))
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get(&self, hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        let row: Option<CacheRow> = sqlx::query_as(SELECT_ENTRY)
            .bind(hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(CacheEntry::from))
    }

    async fn upsert(&self, hash: &str, artifact_path: &Path) -> Result<(), CacheError> {
        let path = path_to_text(artifact_path)?;
        let now = Utc::now();
        sqlx::query(UPSERT_ENTRY)
            .bind(hash)
            .bind(path)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn remove(&self, hash: &str) -> Result<(), CacheError> {
        sqlx::query(DELETE_ENTRY)
            .bind(hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        // Let SQLite refresh query planner statistics before the pool goes away
        _ = sqlx::query("PRAGMA optimize").execute(&self.pool).await;
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        store.close().await;
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        assert!(store.get("nope").await.unwrap().is_none());
        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.upsert("abc", Path::new("out/doc-0.svg")).await.unwrap();

        let entry = store.get("abc").await.unwrap().unwrap();
        assert_eq!(entry.content_hash, "abc");
        assert_eq!(entry.artifact_path, PathBuf::from("out/doc-0.svg"));
        assert_eq!(entry.created_at, entry.updated_at);
        store.close().await;
    }

    #[tokio::test]
    async fn test_upsert_same_key_updates_in_place() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.upsert("abc", Path::new("first.svg")).await.unwrap();
        let first = store.get("abc").await.unwrap().unwrap();

        store.upsert("abc", Path::new("second.svg")).await.unwrap();
        let second = store.get("abc").await.unwrap().unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(second.artifact_path, PathBuf::from("second.svg"));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
        store.close().await;
    }

    #[tokio::test]
    async fn test_remove() {
        let store = SqliteStore::open_in_memory().await.unwrap();
        store.upsert("abc", Path::new("a.svg")).await.unwrap();
        store.remove("abc").await.unwrap();
        store.remove("abc").await.unwrap();

        assert!(store.get("abc").await.unwrap().is_none());
        store.close().await;
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let db = tmp.path().join("nested/dir/cache.db");

        let store = SqliteStore::open(&db).await.unwrap();
        store.upsert("abc", Path::new("a.svg")).await.unwrap();
        store.close().await;

        let reopened = SqliteStore::open(&db).await.unwrap();
        let entry = reopened.get("abc").await.unwrap().unwrap();
        assert_eq!(entry.artifact_path, PathBuf::from("a.svg"));
        reopened.close().await;
    }

    #[tokio::test]
    async fn test_open_fails_when_parent_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let result = SqliteStore::open(&blocker.join("cache.db")).await;
        assert!(result.is_err());
    }
}
