//! Book source registry.
//!
//! The sources books can be searched for and read from, with an enabled
//! flag and a priority. The list is persisted as one JSON record and can be
//! exported to or imported from JSON.

use crate::error::StorageError;
use crate::storage::{PreferenceStore, read_json, write_guard, write_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::info;

/// Preference key holding the source list.
const SOURCES_KEY: &str = "shiori.book_sources";

/// A place books come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookSource {
    #[serde(default = "new_source_id")]
    pub source_id: String,
    pub source_name: String,
    pub source_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Higher priorities are listed and tried first.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub last_update_time: Option<DateTime<Utc>>,
}

fn new_source_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn enabled_by_default() -> bool {
    true
}

impl BookSource {
    /// Creates an enabled source with a fresh id and priority 0.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source_id: new_source_id(),
            source_name: name.into(),
            source_url: url.into(),
            group: None,
            comment: None,
            enabled: true,
            priority: 0,
            last_update_time: None,
        }
    }
}

/// The sources a fresh install starts with.
pub fn default_sources() -> Vec<BookSource> {
    let mut builtin = BookSource::new("Built-in", "mock://shiori");
    builtin.source_id = "builtin".to_string();
    builtin.group = Some("Built-in".to_string());
    builtin.comment = Some("Generated sample chapters".to_string());
    builtin.priority = 100;
    vec![builtin]
}

/// Persistent source registry.
pub struct BookSourceStore {
    prefs: Arc<dyn PreferenceStore>,
    write_lock: Mutex<()>,
}

impl BookSourceStore {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self {
            prefs,
            write_lock: Mutex::new(()),
        }
    }

    /// Every source, highest priority first.
    ///
    /// Until the list is first written this returns the default sources.
    pub fn all(&self) -> Result<Vec<BookSource>, StorageError> {
        let mut sources = self.load()?;
        sources.sort_by(|a, b| b.priority.cmp(&a.priority));
        Ok(sources)
    }

    /// Enabled sources, highest priority first.
    pub fn enabled(&self) -> Result<Vec<BookSource>, StorageError> {
        Ok(self.all()?.into_iter().filter(|s| s.enabled).collect())
    }

    /// Looks up a source by its display name.
    pub fn by_name(&self, name: &str) -> Result<Option<BookSource>, StorageError> {
        Ok(self.all()?.into_iter().find(|s| s.source_name == name))
    }

    pub fn in_group(&self, group: &str) -> Result<Vec<BookSource>, StorageError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|s| s.group.as_deref() == Some(group))
            .collect())
    }

    /// Adds a source, replacing any source with the same id.
    pub fn add(&self, source: BookSource) -> Result<(), StorageError> {
        let _guard = write_guard(&self.write_lock);
        let mut sources = self.load()?;
        upsert(&mut sources, stamped(source));
        self.store(&sources)
    }

    /// Replaces an existing source. Returns false if no source has its id.
    pub fn update(&self, source: BookSource) -> Result<bool, StorageError> {
        let _guard = write_guard(&self.write_lock);
        let mut sources = self.load()?;
        let Some(existing) = sources.iter_mut().find(|s| s.source_id == source.source_id) else {
            return Ok(false);
        };
        *existing = stamped(source);
        self.store(&sources)?;
        Ok(true)
    }

    /// Removes a source by id. Returns false if it was not present.
    pub fn remove(&self, source_id: &str) -> Result<bool, StorageError> {
        let _guard = write_guard(&self.write_lock);
        let mut sources = self.load()?;
        let before = sources.len();
        sources.retain(|s| s.source_id != source_id);
        if sources.len() == before {
            return Ok(false);
        }
        self.store(&sources)?;
        Ok(true)
    }

    /// Enables or disables the source with the given name.
    pub fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool, StorageError> {
        let Some(mut source) = self.by_name(name)? else {
            return Ok(false);
        };
        source.enabled = enabled;
        self.update(source)
    }

    /// Merges sources from a JSON array into the registry.
    ///
    /// Entries without an id get a fresh one; entries whose id already
    /// exists replace it. Returns how many sources were imported. Nothing
    /// is written if the JSON does not parse.
    pub fn import_json(&self, json: &str) -> Result<usize, StorageError> {
        let incoming: Vec<BookSource> =
            serde_json::from_str(json).map_err(|source| StorageError::Decode {
                key: "book source import".to_string(),
                source,
            })?;

        let _guard = write_guard(&self.write_lock);
        let mut sources = self.load()?;
        let count = incoming.len();
        for source in incoming {
            upsert(&mut sources, stamped(source));
        }
        self.store(&sources)?;
        info!(count, "Imported book sources");
        Ok(count)
    }

    /// Serializes every source as a pretty-printed JSON array.
    pub fn export_json(&self) -> Result<String, StorageError> {
        let sources = self.all()?;
        serde_json::to_string_pretty(&sources).map_err(|source| StorageError::Encode {
            key: SOURCES_KEY.to_string(),
            source,
        })
    }

    /// Replaces the registry with the default sources.
    pub fn reset_to_defaults(&self) -> Result<Vec<BookSource>, StorageError> {
        let _guard = write_guard(&self.write_lock);
        let defaults = default_sources();
        self.store(&defaults)?;
        Ok(defaults)
    }

    fn load(&self) -> Result<Vec<BookSource>, StorageError> {
        Ok(read_json(self.prefs.as_ref(), SOURCES_KEY)?.unwrap_or_else(default_sources))
    }

    fn store(&self, sources: &[BookSource]) -> Result<(), StorageError> {
        write_json(self.prefs.as_ref(), SOURCES_KEY, &sources)
    }
}

fn stamped(mut source: BookSource) -> BookSource {
    source.last_update_time = Some(Utc::now());
    source
}

fn upsert(sources: &mut Vec<BookSource>, source: BookSource) {
    match sources.iter_mut().find(|s| s.source_id == source.source_id) {
        Some(existing) => *existing = source,
        None => sources.push(source),
    }
}
