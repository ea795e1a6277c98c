//! In-memory cache store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;

use crate::{CacheEntry, CacheError, CacheStore};

/// [`CacheStore`] backed by a mutex-guarded map.
///
/// Entries vanish with the process. Same upsert semantics as
/// [`SqliteStore`](crate::SqliteStore).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, hash: &str) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.lock().get(hash).cloned())
    }

    async fn upsert(&self, hash: &str, artifact_path: &Path) -> Result<(), CacheError> {
        let now = Utc::now();
        self.lock()
            .entry(hash.to_owned())
            .and_modify(|entry| {
                entry.artifact_path = artifact_path.to_path_buf();
                entry.updated_at = now;
            })
            .or_insert_with(|| CacheEntry {
                content_hash: hash.to_owned(),
                artifact_path: artifact_path.to_path_buf(),
                created_at: now,
                updated_at: now,
            });
        Ok(())
    }

    async fn remove(&self, hash: &str) -> Result<(), CacheError> {
        self.lock().remove(hash);
        Ok(())
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_upsert_overwrites_path_and_keeps_created_at() {
        let store = MemoryStore::new();
        store.upsert("k", Path::new("a.svg")).await.unwrap();
        let first = store.get("k").await.unwrap().unwrap();

        store.upsert("k", Path::new("b.svg")).await.unwrap();
        let second = store.get("k").await.unwrap().unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(second.artifact_path, PathBuf::from("b.svg"));
        assert_eq!(second.created_at, first.created_at);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let store = MemoryStore::new();
        store.remove("nope").await.unwrap();
        assert!(store.is_empty());
    }
}
