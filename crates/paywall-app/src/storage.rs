//! Page-local storage for the authenticated user.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use paywall_proto::UserInfo;
use thiserror::Error;

/// Storage failures. Never fatal to the paywall.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// Backend refused the operation
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Stored value could not be decoded
    #[error("corrupt entry under {key}: {reason}")]
    Corrupt {
        /// Storage key
        key: String,
        /// Decode error
        reason: String,
    },
}

/// String key/value store scoped to the host page.
pub trait Storage: Send {
    /// Value under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`.
    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError>;

    /// Delete `key`.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Read the cached user under `key`.
pub fn load_user(storage: &dyn Storage, key: &str) -> Result<Option<UserInfo>, StorageError> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StorageError::Corrupt { key: key.to_string(), reason: e.to_string() })
}

/// Cache `user` under `key`.
pub fn store_user(
    storage: &mut dyn Storage,
    key: &str,
    user: &UserInfo,
) -> Result<(), StorageError> {
    let raw = serde_json::to_string(user)
        .map_err(|e| StorageError::Unavailable(format!("encode user info: {e}")))?;
    storage.set(key, raw)
}

/// In-memory storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Storage pre-populated with `entries`.
    pub fn with_entries(entries: impl IntoIterator<Item = (String, String)>) -> Self {
        Self { entries: Arc::new(Mutex::new(entries.into_iter().collect())) }
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Unavailable("storage lock poisoned".to_string())
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries.lock().map_err(poisoned)?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}
