//! Error types for the Shiori reading core.
//!
//! Uses `thiserror` for structured error definitions that provide
//! clear context about what went wrong.

use thiserror::Error;

/// Error returned when chapter content could not be retrieved.
///
/// Cloneable so a single fetch result can be fanned out to every
/// caller waiting on the same chapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The content source could not be reached or refused the request
    #[error("Content source unavailable: {0}")]
    Unavailable(String),

    /// The source has no content for this chapter
    #[error("Chapter not found: {0}")]
    NotFound(String),

    /// The fetch task ended before producing a result
    #[error("Fetch interrupted: {0}")]
    Interrupted(String),
}

/// A navigation target that does not belong to the session's catalog.
///
/// This is a programmer error and is reported immediately rather than
/// turned into a `Failed` reader state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidChapterError {
    /// Index is outside the catalog
    #[error("Chapter index {index} out of range for catalog of {len} chapters")]
    OutOfRange { index: usize, len: usize },

    /// Chapter belongs to a different book
    #[error("Chapter belongs to book '{found}', session is reading '{expected}'")]
    ForeignBook { expected: String, found: String },

    /// Chapter id does not match the catalog entry at its index
    #[error("Chapter '{0}' is not part of this catalog")]
    UnknownChapter(String),
}

/// Error type for the preference storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Failed to read or write the backing files
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to encode a record
    #[error("Failed to encode record for '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Stored bytes could not be decoded
    #[error("Failed to decode record for '{key}': {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure to propagate saved progress to the bookshelf.
///
/// Never fatal: the progress record is already durable when this occurs.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The book is no longer on the shelf
    #[error("Book '{0}' not found on the bookshelf")]
    BookMissing(String),

    /// The bookshelf write failed
    #[error("Bookshelf update failed: {0}")]
    Storage(#[from] StorageError),
}

/// Error type for opening a reader session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// The book has no chapters to read
    #[error("Book '{0}' has no chapters")]
    EmptyCatalog(String),

    /// The requested book is not on the shelf
    #[error("Book '{0}' not found")]
    BookNotFound(String),

    /// The catalog was generated for another book
    #[error("Catalog for '{catalog}' cannot be read as book '{book}'")]
    CatalogMismatch { book: String, catalog: String },

    /// Reading persisted state failed
    #[error("Failed to read reader state: {0}")]
    Storage(#[from] StorageError),
}

/// Error type for configuration operations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse config file
    #[error("Failed to parse config: {0}")]
    ParseError(String),

    /// Invalid configuration value
    #[error("Invalid config value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Config directory not found
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias using anyhow for application-level error handling.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_chapter_messages() {
        let err = InvalidChapterError::OutOfRange { index: 7, len: 3 };
        assert_eq!(
            err.to_string(),
            "Chapter index 7 out of range for catalog of 3 chapters"
        );

        let err = InvalidChapterError::ForeignBook {
            expected: "a".to_string(),
            found: "b".to_string(),
        };
        assert!(err.to_string().contains("'b'"));
    }

    #[test]
    fn test_persistence_error_from_storage() {
        let io = std::io::Error::other("disk full");
        let err: PersistenceError = StorageError::from(io).into();
        assert!(err.to_string().contains("disk full"));
    }
}
