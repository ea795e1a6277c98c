//! Persistent render cache for bake.
//!
//! Maps a content hash (see `bake_diagrams::ContentKey`) to the path of the
//! artifact rendered for it, so identical diagrams are never rendered twice
//! across runs. Two layers form the API:
//!
//! - [`CacheStore`]: raw key-value backend with upsert semantics
//! - [`RenderCache`]: artifact-aware front end that refuses to hand out paths
//!   whose files have disappeared from disk
//!
//! # Implementations
//!
//! - [`SqliteStore`]: SQLite database that survives process restarts
//! - [`MemoryStore`]: in-process map, for tests and dry experiments
//!
//! # Example
//!
//! ```ignore
//! use bake_cache::{RenderCache, SqliteStore};
//!
//! let cache = RenderCache::new(SqliteStore::open(".bake/render-cache.db".as_ref()).await?);
//! if let Some(path) = cache.lookup(&hash).await? {
//!     // reuse the artifact at `path`
//! }
//! cache.close().await;
//! ```

mod memory;
mod sqlite;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// A single cached render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Hex content hash the artifact was rendered from.
    pub content_hash: String,
    /// Where the rendered artifact was written.
    pub artifact_path: PathBuf,
    /// When the entry was first stored.
    pub created_at: DateTime<Utc>,
    /// When the entry was last overwritten.
    pub updated_at: DateTime<Utc>,
}

/// Cache error.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The backing database could not be opened or created.
    #[error("failed to open cache database {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: sqlx::Error,
    },
    /// Schema migration failed.
    #[error("cache migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    /// A query against an open database failed.
    #[error("cache query failed: {0}")]
    Query(#[from] sqlx::Error),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Artifact paths are stored as text and must be UTF-8.
    #[error("artifact path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
}

/// Key-value backend for [`RenderCache`].
///
/// Keys are opaque hex content hashes. Implementations must be safe to share
/// between tasks; `upsert` on an existing key overwrites the artifact path and
/// refreshes `updated_at` instead of adding a second entry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the entry for `hash`, if any.
    async fn get(&self, hash: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or overwrite the entry for `hash`.
    async fn upsert(&self, hash: &str, artifact_path: &Path) -> Result<(), CacheError>;

    /// Delete the entry for `hash`. Deleting a missing key is not an error.
    async fn remove(&self, hash: &str) -> Result<(), CacheError>;

    /// Release the backend. The store must not be used afterwards.
    async fn close(&self);
}

/// Artifact-aware cache handle.
///
/// Owned by the batch for its whole run and lent to the document processor.
/// An entry is only trusted while its artifact still exists: a lookup that
/// finds the file missing deletes the entry and reports a miss, so manually
/// deleted output gets re-rendered on the next run.
#[derive(Debug)]
pub struct RenderCache<S> {
    backend: S,
}

impl<S: CacheStore> RenderCache<S> {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: S) -> Self {
        Self { backend }
    }

    /// Return the cached artifact path for `hash` if the file is still on disk.
    pub async fn lookup(&self, hash: &str) -> Result<Option<PathBuf>, CacheError> {
        let Some(entry) = self.backend.get(hash).await? else {
            return Ok(None);
        };

        match tokio::fs::try_exists(&entry.artifact_path).await {
            Ok(true) => return Ok(Some(entry.artifact_path)),
            Ok(false) => {}
            Err(e) => {
                // Unknown state: render again but keep the entry
                tracing::warn!(
                    hash,
                    path = %entry.artifact_path.display(),
                    error = %e,
                    "cannot check cached artifact, treating as miss"
                );
                return Ok(None);
            }
        }

        tracing::info!(
            hash,
            path = %entry.artifact_path.display(),
            "cached artifact missing on disk, dropping entry"
        );
        self.backend.remove(hash).await?;
        Ok(None)
    }

    /// Record that `hash` was rendered to `artifact_path`.
    pub async fn store(&self, hash: &str, artifact_path: &Path) -> Result<(), CacheError> {
        self.backend.upsert(hash, artifact_path).await
    }

    /// Close the backend.
    pub async fn close(&self) {
        self.backend.close().await;
    }

    /// Access the backend directly.
    pub fn backend(&self) -> &S {
        &self.backend
    }
}
