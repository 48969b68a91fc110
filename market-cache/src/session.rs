//! Session-scoped cache of serialised values.
//!
//! Entries are stored as JSON strings in a [`SessionStore`] together with
//! their write time and TTL, so they survive while the session lives but
//! expire on their own. Storage failures are logged and swallowed: a broken
//! session store must never break the caller.

use crate::error::SessionError;
use chrono::Utc;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const DEFAULT_SESSION_TTL_MINUTES: u32 = 30;

/// String key/value storage backing a [`SessionCache`]
pub trait SessionStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), SessionError>;
    fn remove_item(&self, key: &str) -> Result<(), SessionError>;
}

impl<S: SessionStore + ?Sized> SessionStore for Box<S> {
    fn get_item(&self, key: &str) -> Result<Option<String>, SessionError> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), SessionError> {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> Result<(), SessionError> {
        (**self).remove_item(key)
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemorySessionStore {
    items: DashMap<String, String>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.items.get(key).map(|value| value.clone()))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), SessionError> {
        self.items.remove(key);
        Ok(())
    }
}

/// One JSON file per key inside a directory
pub struct FileSessionStore {
    dir: PathBuf,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", filenamify::filenamify(key)))
    }
}

impl SessionStore for FileSessionStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, SessionError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), SessionError> {
        fs::write(self.path_for(key), value)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), SessionError> {
        match fs::remove_file(self.path_for(key)) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

/// Persisted form of a session entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry<T> {
    pub data: T,
    /// Write time in milliseconds since the Unix epoch
    pub timestamp: i64,
    pub ttl_minutes: u32,
}

impl<T> SessionEntry<T> {
    pub fn expires_at(&self) -> i64 {
        self.timestamp + i64::from(self.ttl_minutes) * 60 * 1000
    }

    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis >= self.expires_at()
    }
}

/// Result of [`SessionCache::load`]
#[derive(Debug, Clone, PartialEq)]
pub struct SessionLoad<T> {
    pub data: Option<T>,
    pub from_cache: bool,
}

impl<T> SessionLoad<T> {
    fn miss() -> Self {
        Self {
            data: None,
            from_cache: false,
        }
    }
}

pub struct SessionCache<S> {
    store: S,
    ttl_minutes: u32,
}

impl<S: SessionStore> SessionCache<S> {
    pub fn new(store: S) -> Self {
        Self::with_ttl(store, DEFAULT_SESSION_TTL_MINUTES)
    }

    pub fn with_ttl(store: S, ttl_minutes: u32) -> Self {
        Self { store, ttl_minutes }
    }

    pub fn store_backend(&self) -> &S {
        &self.store
    }

    pub fn ttl_minutes(&self) -> u32 {
        self.ttl_minutes
    }

    /// Load a live entry. Expired entries are removed on the way.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> SessionLoad<T> {
        let raw = match self.store.get_item(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return SessionLoad::miss(),
            Err(err) => {
                log::warn!("Failed to load from session cache: {}", err);
                return SessionLoad::miss();
            }
        };

        let entry: SessionEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                log::warn!("Failed to load from session cache: {}", err);
                return SessionLoad::miss();
            }
        };

        if entry.is_expired(Utc::now().timestamp_millis()) {
            log::debug!("Session entry expired for key: {}", key);
            if let Err(err) = self.store.remove_item(key) {
                log::warn!("Failed to clear session cache: {}", err);
            }
            return SessionLoad::miss();
        }

        SessionLoad {
            data: Some(entry.data),
            from_cache: true,
        }
    }

    /// Persist `data` under `key` with the cache TTL
    pub fn store<T: Serialize>(&self, key: &str, data: &T) {
        let entry = SessionEntry {
            data,
            timestamp: Utc::now().timestamp_millis(),
            ttl_minutes: self.ttl_minutes,
        };

        let result = serde_json::to_string(&entry)
            .map_err(SessionError::from)
            .and_then(|raw| self.store.set_item(key, &raw));
        if let Err(err) = result {
            log::warn!("Failed to save to session cache: {}", err);
        }
    }

    pub fn clear(&self, key: &str) {
        if let Err(err) = self.store.remove_item(key) {
            log::warn!("Failed to clear session cache: {}", err);
        }
    }
}

/// Key for per-symbol data, e.g. `stock-profile-AAPL`
pub fn stock_key(symbol: &str, data_type: &str) -> String {
    format!("stock-{}-{}", data_type, symbol.to_uppercase())
}

/// Key for per-user portfolio data
pub fn portfolio_key(user_id: Option<&str>, data_type: &str) -> String {
    match user_id {
        Some(user_id) => format!("portfolio-{}-{}", data_type, user_id),
        None => format!("portfolio-{}", data_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempdir::TempDir;

    #[test]
    fn test_round_trip_marks_from_cache() {
        let cache = SessionCache::new(MemorySessionStore::new());
        cache.store("stock-profile-AAPL", &json!({"name": "Apple Inc."}));

        let loaded = cache.load::<serde_json::Value>("stock-profile-AAPL");
        assert!(loaded.from_cache);
        assert_eq!(loaded.data.unwrap()["name"], "Apple Inc.");
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let store = MemorySessionStore::new();
        let stale = SessionEntry {
            data: 5,
            timestamp: Utc::now().timestamp_millis() - 31 * 60 * 1000,
            ttl_minutes: 30,
        };
        store
            .set_item("portfolio-health-u1", &serde_json::to_string(&stale).unwrap())
            .unwrap();
        let cache = SessionCache::new(store);

        let loaded = cache.load::<i32>("portfolio-health-u1");
        assert_eq!(loaded, SessionLoad { data: None, from_cache: false });
        assert!(cache
            .store_backend()
            .get_item("portfolio-health-u1")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() {
        let store = MemorySessionStore::new();
        store.set_item("k", "{not json").unwrap();
        let cache = SessionCache::new(store);
        assert_eq!(cache.load::<i32>("k").data, None);
    }

    #[test]
    fn test_clear() {
        let cache = SessionCache::with_ttl(MemorySessionStore::new(), 5);
        cache.store("k", &1);
        cache.clear("k");
        assert!(!cache.load::<i32>("k").from_cache);
    }

    #[test]
    fn test_file_store_persists_between_instances() {
        let dir = TempDir::new("session-cache").unwrap();
        {
            let cache = SessionCache::new(FileSessionStore::new(dir.path()).unwrap());
            cache.store(&stock_key("brk.b", "quote"), &vec![1.5, 2.5]);
        }

        let cache = SessionCache::new(FileSessionStore::new(dir.path()).unwrap());
        let loaded = cache.load::<Vec<f64>>("stock-quote-BRK.B");
        assert_eq!(loaded.data, Some(vec![1.5, 2.5]));

        cache.clear("stock-quote-BRK.B");
        assert!(cache.load::<Vec<f64>>("stock-quote-BRK.B").data.is_none());
    }

    #[test]
    fn test_key_helpers() {
        assert_eq!(stock_key("aapl", "news"), "stock-news-AAPL");
        assert_eq!(portfolio_key(Some("u1"), "risk"), "portfolio-risk-u1");
        assert_eq!(portfolio_key(None, "risk"), "portfolio-risk");
    }
}
