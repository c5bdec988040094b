//! Shiori - reading core for an e-book reader.
//!
//! This library provides functionality for:
//! - Managing a bookshelf and per-book reading progress
//! - Delivering chapter content with caching, coalesced fetches and prefetch
//! - Driving a reader session through chapter navigation
//! - Persisting reader display settings
//! - Managing book sources and reading statistics

pub mod bookshelf;
pub mod catalog;
pub mod config;
pub mod console;
pub mod content;
pub mod error;
pub mod library;
pub mod logging;
pub mod models;
pub mod pagination;
pub mod progress;
pub mod search;
pub mod session;
pub mod settings;
pub mod sources;
pub mod stats;
pub mod storage;

// Re-export commonly used types
pub use bookshelf::{Bookshelf, BookshelfStore};
pub use catalog::ChapterCatalog;
pub use config::Config;
pub use console::Console;
pub use content::{ChapterFetcher, ContentStore, MockChapterSource};
pub use error::{
    ConfigError, FetchError, InvalidChapterError, PersistenceError, SessionError, StorageError,
};
pub use library::Library;
pub use models::{Book, BookKind, Chapter};
pub use progress::{ProgressStore, ReadingProgress};
pub use session::{LoadOutcome, ReaderSession, ReaderState};
pub use settings::{ReadingSettings, ReadingTheme, SettingsStore};
pub use sources::{BookSource, BookSourceStore};
pub use stats::{ReadingRecord, ReadingStatsStore};
pub use storage::{FilePreferences, MemoryPreferences, PreferenceStore};
