// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Durable key/value storage on the device.
//!
//! Values are JSON documents under a small fixed set of keys. There is no
//! schema versioning: changing a stored shape is a breaking change.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Logical storage keys.
pub mod keys {
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    pub const BREADCRUMBS: &str = "breadcrumbs";
    pub const CHECK_IN: &str = "checkIn";
}

/// Errors from local storage.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Raw string storage backend.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key under a directory.
///
/// Writes go to a temporary file that is renamed over the target, so a crash
/// leaves either the old or the new value.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.json", urlencoding::encode(key)))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Volatile backend for tests and previews.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Typed JSON access over a [`KeyValueStore`].
#[derive(Clone)]
pub struct LocalStorage {
    backend: Arc<dyn KeyValueStore>,
}

impl LocalStorage {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    pub async fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.backend.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub async fn set_item<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.backend.set(key, raw).await
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.backend.remove(key).await
    }

    /// Logged-in flag; unreadable or missing means logged out.
    pub async fn is_logged_in(&self) -> bool {
        match self.get_item::<bool>(keys::IS_LOGGED_IN).await {
            Ok(flag) => flag.unwrap_or(false),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read logged-in flag");
                false
            }
        }
    }

    pub async fn set_logged_in(&self, logged_in: bool) -> Result<(), StorageError> {
        if logged_in {
            self.set_item(keys::IS_LOGGED_IN, &true).await
        } else {
            self.remove_item(keys::IS_LOGGED_IN).await
        }
    }
}
