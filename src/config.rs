//! Configuration management for Shiori.
//!
//! Handles loading, saving, and validating configuration from
//! platform-specific config directories.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application name used for config directory.
const APP_NAME: &str = "Shiori";

/// Default config filename.
const CONFIG_FILENAME: &str = "config.toml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Reader session behavior.
    pub reader: ReaderConfig,

    /// Chapter content cache settings.
    pub cache: CacheConfig,

    /// Mock content and search source settings.
    pub source: SourceConfig,

    /// File paths.
    pub paths: PathsConfig,
}

/// Reader session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Number of chapters after the current one to prefetch.
    pub prefetch_count: usize,

    /// Characters per page when paginating chapter text.
    pub chars_per_page: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            prefetch_count: 2,
            chars_per_page: 600,
        }
    }
}

/// Content cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of chapters kept in memory.
    pub max_chapters: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_chapters: 200 }
    }
}

/// Mock source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Simulated latency of a chapter fetch in milliseconds.
    pub chapter_latency_ms: u64,

    /// Simulated latency of a search in milliseconds.
    pub search_latency_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            chapter_latency_ms: 500,
            search_latency_ms: 1000,
        }
    }
}

/// File path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding persisted preferences.
    /// Defaults to a `data` directory next to the config file.
    pub data_directory: Option<PathBuf>,
}

impl Config {
    /// Returns the platform-specific config directory path.
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join(APP_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Returns the full path to the config file.
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILENAME))
    }

    /// Loads configuration from the default location.
    ///
    /// If the config file doesn't exist, creates a default one.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            let config = Config::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Saves configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.max_chapters == 0 {
            return Err(ConfigError::InvalidValue {
                key: "cache.max_chapters".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        if self.reader.chars_per_page == 0 {
            return Err(ConfigError::InvalidValue {
                key: "reader.chars_per_page".to_string(),
                message: "must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Returns the effective data directory, using config or default.
    pub fn data_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.paths.data_directory {
            Ok(dir.clone())
        } else {
            Ok(Self::config_dir()?.join("data"))
        }
    }
}
