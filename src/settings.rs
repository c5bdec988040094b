//! Reader display settings.
//!
//! Font size, theme and spacing chosen by the reader, persisted as one
//! record. Values outside the supported ranges are clamped.

use crate::error::StorageError;
use crate::storage::{PreferenceStore, read_json, write_json};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Preference key holding the settings record.
const SETTINGS_KEY: &str = "shiori.reading_settings";

pub const FONT_SIZE_RANGE: RangeInclusive<f32> = 14.0..=32.0;
pub const LINE_SPACING_RANGE: RangeInclusive<f32> = 0.0..=20.0;
pub const PARAGRAPH_SPACING_RANGE: RangeInclusive<f32> = 0.0..=30.0;

/// Page color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReadingTheme {
    #[default]
    White,
    Sepia,
    Green,
    Night,
}

impl std::str::FromStr for ReadingTheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "white" => Ok(Self::White),
            "sepia" => Ok(Self::Sepia),
            "green" => Ok(Self::Green),
            "night" => Ok(Self::Night),
            other => Err(format!("unknown theme '{}'", other)),
        }
    }
}

impl std::fmt::Display for ReadingTheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::White => "white",
            Self::Sepia => "sepia",
            Self::Green => "green",
            Self::Night => "night",
        };
        f.write_str(name)
    }
}

/// Display settings for the reader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadingSettings {
    pub font_size: f32,
    pub theme: ReadingTheme,
    pub line_spacing: f32,
    pub paragraph_spacing: f32,
    pub page_turn_animation: bool,
    pub keep_screen_on: bool,
}

impl Default for ReadingSettings {
    fn default() -> Self {
        Self {
            font_size: 18.0,
            theme: ReadingTheme::White,
            line_spacing: 8.0,
            paragraph_spacing: 15.0,
            page_turn_animation: true,
            keep_screen_on: false,
        }
    }
}

impl ReadingSettings {
    /// Returns a copy with every numeric value inside its supported range.
    pub fn clamped(mut self) -> Self {
        self.font_size = clamp(self.font_size, &FONT_SIZE_RANGE, 18.0);
        self.line_spacing = clamp(self.line_spacing, &LINE_SPACING_RANGE, 8.0);
        self.paragraph_spacing = clamp(self.paragraph_spacing, &PARAGRAPH_SPACING_RANGE, 15.0);
        self
    }
}

fn clamp(value: f32, range: &RangeInclusive<f32>, fallback: f32) -> f32 {
    if value.is_nan() {
        return fallback;
    }
    value.clamp(*range.start(), *range.end())
}

/// Persistent settings store.
pub struct SettingsStore {
    prefs: Arc<dyn PreferenceStore>,
}

impl SettingsStore {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self { prefs }
    }

    /// Loads the saved settings, or the defaults if none were saved.
    pub fn load(&self) -> Result<ReadingSettings, StorageError> {
        let settings: Option<ReadingSettings> = read_json(self.prefs.as_ref(), SETTINGS_KEY)?;
        Ok(settings.unwrap_or_default().clamped())
    }

    /// Saves settings, clamping out-of-range values first.
    pub fn save(&self, settings: ReadingSettings) -> Result<ReadingSettings, StorageError> {
        let settings = settings.clamped();
        write_json(self.prefs.as_ref(), SETTINGS_KEY, &settings)?;
        Ok(settings)
    }

    /// Loads, modifies and saves the settings in one step.
    pub fn update(
        &self,
        change: impl FnOnce(&mut ReadingSettings),
    ) -> Result<ReadingSettings, StorageError> {
        let mut settings = self.load()?;
        change(&mut settings);
        self.save(settings)
    }

    /// Restores the default settings.
    pub fn reset(&self) -> Result<ReadingSettings, StorageError> {
        self.save(ReadingSettings::default())
    }
}
