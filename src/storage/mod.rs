//! Key-value preference storage.
//!
//! Every persisted record (books, progress, settings) lives under a fixed
//! namespace key as an opaque byte blob. This module defines the storage
//! interface and the JSON helpers the stores use on top of it.

mod file;
mod memory;

pub use file::FilePreferences;
pub use memory::MemoryPreferences;

use crate::error::StorageError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Mutex, MutexGuard};

/// Durable key-value byte storage.
///
/// Implementations must make each `set` and `remove` atomic for a single
/// key; callers do full-record read-modify-write on top of that.
pub trait PreferenceStore: Send + Sync {
    /// Returns the bytes stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Removes `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Takes a store's write lock, ignoring poisoning.
///
/// Stores hold this across a whole read-modify-write of their record.
pub(crate) fn write_guard(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(|e| e.into_inner())
}

/// Reads and decodes a JSON record stored under `key`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn PreferenceStore,
    key: &str,
) -> Result<Option<T>, StorageError> {
    let Some(bytes) = store.get(key)? else {
        return Ok(None);
    };

    let value = serde_json::from_slice(&bytes).map_err(|source| StorageError::Decode {
        key: key.to_string(),
        source,
    })?;
    Ok(Some(value))
}

/// Encodes `value` as JSON and stores it under `key`.
pub fn write_json<T: Serialize>(
    store: &dyn PreferenceStore,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    let bytes = serde_json::to_vec(value).map_err(|source| StorageError::Encode {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &bytes)
}
