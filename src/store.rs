//! Device storage backed by `SQLite`
//!
//! A small key-value table (best-effort cache for composer draft metadata)
//! plus a topic cache for reading Bytes offline.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::{Byte, DraftMeta};
use crate::paths;

/// Key under which the composer's `{draft_key, sequence}` pair is cached
pub const DRAFT_META_KEY: &str = "composer.draft_meta";

/// Local cache for the composer's remote draft pointer
///
/// This is a cache, not the source of truth: callers log and swallow
/// failures.
pub trait DraftMetaStore: Send + Sync {
    /// Read the cached pointer
    fn load_draft_meta(&self) -> Result<Option<DraftMeta>>;

    /// Replace the cached pointer
    fn save_draft_meta(&self, meta: &DraftMeta) -> Result<()>;

    /// Forget the cached pointer
    fn clear_draft_meta(&self) -> Result<()>;
}

/// Database connection wrapper
pub struct DeviceStore {
    conn: Mutex<Connection>,
}

impl DeviceStore {
    /// Open or create the store at the default location
    pub fn open() -> Result<Self> {
        let path = paths::database_path()?;
        Self::open_path(&path)
    }

    /// Open or create the store at a specific path
    pub fn open_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }

        let conn = Connection::open(path).context("Failed to open database")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init()?;

        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        self.conn().execute_batch(
            r"
            -- Key-value storage
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Topic cache table
            CREATE TABLE IF NOT EXISTS topic_cache (
                topic_id INTEGER PRIMARY KEY,
                topic_json TEXT NOT NULL,
                cached_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_topic_cache_cached_at ON topic_cache(cached_at);
            ",
        )?;

        Ok(())
    }

    // ==================== Key-value ====================

    /// Read a value
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    /// Write a value, replacing any previous one
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Delete a value
    pub fn remove(&self, key: &str) -> Result<()> {
        self.conn()
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Read a JSON value
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.get(key)?
            .map(|raw| serde_json::from_str(&raw).context("Failed to parse stored value"))
            .transpose()
    }

    /// Write a JSON value
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).context("Failed to serialize value")?;
        self.set(key, &raw)
    }

    // ==================== Topic Cache ====================

    /// Cache a topic
    pub fn cache_topic(&self, topic: &Byte) -> Result<()> {
        let json = serde_json::to_string(topic).context("Failed to serialize topic")?;
        self.conn().execute(
            "INSERT OR REPLACE INTO topic_cache (topic_id, topic_json, cached_at) VALUES (?1, ?2, ?3)",
            params![topic.id as i64, json, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Get a cached topic and when it was cached
    pub fn get_cached_topic(&self, topic_id: u64) -> Result<Option<(Byte, DateTime<Utc>)>> {
        let row: Option<(String, String)> = self
            .conn()
            .query_row(
                "SELECT topic_json, cached_at FROM topic_cache WHERE topic_id = ?1",
                params![topic_id as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((json, cached_at)) = row else {
            return Ok(None);
        };

        let topic = serde_json::from_str(&json).context("Failed to parse cached topic")?;
        let cached_at = DateTime::parse_from_rfc3339(&cached_at)
            .map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc));
        Ok(Some((topic, cached_at)))
    }

    /// Clear old cache entries
    pub fn clear_old_cache(&self, max_age_hours: u64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::hours(max_age_hours as i64);
        let count = self.conn().execute(
            "DELETE FROM topic_cache WHERE cached_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(count)
    }
}

impl DraftMetaStore for DeviceStore {
    fn load_draft_meta(&self) -> Result<Option<DraftMeta>> {
        self.get_json(DRAFT_META_KEY)
    }

    fn save_draft_meta(&self, meta: &DraftMeta) -> Result<()> {
        self.set_json(DRAFT_META_KEY, meta)
    }

    fn clear_draft_meta(&self) -> Result<()> {
        self.remove(DRAFT_META_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_init() {
        let dir = tempdir().unwrap();
        let _store = DeviceStore::open_path(&dir.path().join("test.sqlite")).unwrap();
    }

    #[test]
    fn test_kv_crud() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::open_path(&dir.path().join("test.sqlite")).unwrap();

        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));

        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn test_draft_meta_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let meta = DraftMeta {
            draft_key: "new_topic".to_string(),
            sequence: 4,
        };

        {
            let store = DeviceStore::open_path(&path).unwrap();
            store.save_draft_meta(&meta).unwrap();
        }

        let store = DeviceStore::open_path(&path).unwrap();
        assert_eq!(store.load_draft_meta().unwrap(), Some(meta));

        store.clear_draft_meta().unwrap();
        assert_eq!(store.load_draft_meta().unwrap(), None);
    }

    #[test]
    fn test_topic_cache() {
        let dir = tempdir().unwrap();
        let store = DeviceStore::open_path(&dir.path().join("test.sqlite")).unwrap();
        let topic = crate::api::fake::topic(12, &[100, 101]);

        store.cache_topic(&topic).unwrap();
        let (cached, _) = store.get_cached_topic(12).unwrap().unwrap();
        assert_eq!(cached, topic);
        assert!(store.get_cached_topic(13).unwrap().is_none());

        assert_eq!(store.clear_old_cache(1).unwrap(), 0);
    }
}
