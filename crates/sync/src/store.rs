//! Local durable storage: one JSON document per fixed key.
//!
//! Each key maps to `<dir>/<key>.json`. Writes go to a temporary sibling
//! first and are renamed into place, so a crash mid-write leaves the
//! previous document intact.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use fieldboard_core::group::GroupStore;
use fieldboard_core::prefs::UserPreferences;
use fieldboard_core::queue::QueueEntry;

pub const KEY_LAYOUT_GROUPS: &str = "layout_groups";
pub const KEY_USER_PREFERENCES: &str = "user_preferences";
pub const KEY_OFFLINE_QUEUE: &str = "offline_queue";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed stored document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone)]
pub struct JsonStore {
    dir: PathBuf,
}

impl JsonStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    /// Read and decode the document under `key`; `None` if it was never written.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let path = self.path_for(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Atomically replace the document under `key`.
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.json.tmp"));
        let bytes = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::trace!(key, bytes = bytes.len(), "Stored document");
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    // ---- typed accessors ----

    pub async fn load_groups(&self) -> Result<Option<GroupStore>, StoreError> {
        self.load(KEY_LAYOUT_GROUPS).await
    }

    pub async fn save_groups(&self, groups: &GroupStore) -> Result<(), StoreError> {
        self.save(KEY_LAYOUT_GROUPS, groups).await
    }

    /// Stored preferences, or defaults if none were saved.
    pub async fn load_preferences(&self) -> Result<UserPreferences, StoreError> {
        Ok(self.load(KEY_USER_PREFERENCES).await?.unwrap_or_default())
    }

    pub async fn save_preferences(&self, prefs: &UserPreferences) -> Result<(), StoreError> {
        self.save(KEY_USER_PREFERENCES, prefs).await
    }

    pub async fn load_queue(&self) -> Result<Vec<QueueEntry>, StoreError> {
        Ok(self.load(KEY_OFFLINE_QUEUE).await?.unwrap_or_default())
    }

    pub async fn save_queue(&self, entries: &[QueueEntry]) -> Result<(), StoreError> {
        self.save(KEY_OFFLINE_QUEUE, entries).await
    }
}
