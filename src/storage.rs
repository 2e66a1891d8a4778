//! Key-value persistence port.
//!
//! The client persists a handful of string values (see
//! [`IdentityStore`](crate::identity::IdentityStore)) that must survive a
//! restart of the client. A missing key always reads back as the empty
//! string; there is no separate "absent" state.
//!
//! Two implementations are provided:
//!
//! | Store             | Survives restart | Use                         |
//! |-------------------|------------------|-----------------------------|
//! | [`MemoryStore`]   | no               | tests, ephemeral sessions   |
//! | [`JsonFileStore`] | yes              | desktop and CLI clients     |

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::error::{Result, SyncError};

/// A string key-value store with change notification.
///
/// Implementations are shared between the session loop and callers, so all
/// methods take `&self`.
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read a value. Missing keys read as `""`.
    fn get(&self, key: &str) -> String;

    /// Write a value and notify subscribers of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Storage`] if the value could not be persisted.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Watch a key. The receiver starts at the current value.
    fn subscribe(&self, key: &str) -> watch::Receiver<String>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-key change channels shared by both stores.
#[derive(Debug, Default)]
struct Watchers {
    senders: Mutex<HashMap<String, watch::Sender<String>>>,
}

impl Watchers {
    fn subscribe(&self, key: &str, current: String) -> watch::Receiver<String> {
        let mut senders = lock(&self.senders);
        senders
            .entry(key.to_string())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }

    fn notify(&self, key: &str, value: &str) {
        if let Some(tx) = lock(&self.senders).get(key) {
            tx.send_if_modified(|old| {
                if old.as_str() == value {
                    false
                } else {
                    value.clone_into(old);
                    true
                }
            });
        }
    }
}

// ── MemoryStore ─────────────────────────────────────────────────────

/// Volatile store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
    watchers: Watchers,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> String {
        lock(&self.values).get(key).cloned().unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        lock(&self.values).insert(key.to_string(), value.to_string());
        self.watchers.notify(key, value);
        Ok(())
    }

    fn subscribe(&self, key: &str) -> watch::Receiver<String> {
        self.watchers.subscribe(key, self.get(key))
    }
}

// ── JsonFileStore ───────────────────────────────────────────────────

/// Store persisted as a flat JSON object on disk.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous contents intact.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, String>>,
    watchers: Watchers,
}

impl JsonFileStore {
    /// Open the store at `path`, loading existing values if the file exists.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file exists but cannot be read, or
    /// [`SyncError::Serialization`] if it is not a JSON object of strings.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let raw = fs::read(&path)?;
            serde_json::from_slice(&raw)?
        } else {
            HashMap::new()
        };
        tracing::debug!(path = %path.display(), keys = values.len(), "opened persisted store");
        Ok(Self {
            path,
            values: Mutex::new(values),
            watchers: Watchers::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, values: &HashMap<String, String>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(values).map_err(std::io::Error::other)?;
        let tmp = self.path.with_extension("tmp");
        let mut file = fs::File::create(&tmp)?;
        file.write_all(&data)?;
        file.sync_all()?;
        fs::rename(tmp, &self.path)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> String {
        lock(&self.values).get(key).cloned().unwrap_or_default()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        {
            let mut values = lock(&self.values);
            let mut next = values.clone();
            next.insert(key.to_string(), value.to_string());
            self.write_atomic(&next).map_err(|e| {
                tracing::error!(path = %self.path.display(), "failed to persist {key}: {e}");
                SyncError::Storage(e.to_string())
            })?;
            *values = next;
        }
        self.watchers.notify(key, value);
        Ok(())
    }

    fn subscribe(&self, key: &str) -> watch::Receiver<String> {
        self.watchers.subscribe(key, self.get(key))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("punchline-client-{}-{name}", std::process::id()))
            .join("store.json")
    }

    #[test]
    fn missing_key_reads_empty() {
        let store = MemoryStore::new();
        assert_eq!(store.get("playerId"), "");
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        store.set("token", "abc").unwrap();
        assert_eq!(store.get("token"), "abc");
        store.set("token", "").unwrap();
        assert_eq!(store.get("token"), "");
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let store = MemoryStore::new();
        store.set("token", "first").unwrap();
        let mut rx = store.subscribe("token");
        assert_eq!(*rx.borrow(), "first");

        store.set("token", "second").unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), "second");
    }

    #[test]
    fn unchanged_value_does_not_notify() {
        let store = MemoryStore::new();
        store.set("k", "v").unwrap();
        let rx = store.subscribe("k");
        store.set("k", "v").unwrap();
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn file_store_survives_reopen() {
        let path = temp_path("reopen");
        let _ = fs::remove_file(&path);
        {
            let store = JsonFileStore::open(&path).unwrap();
            store.set("playerId", "p1").unwrap();
            store.set("token", "t1").unwrap();
        }
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("playerId"), "p1");
        assert_eq!(store.get("token"), "t1");
        assert!(!path.with_extension("tmp").exists());
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let path = temp_path("corrupt");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(SyncError::Serialization(_))
        ));
        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}
