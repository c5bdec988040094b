//! Core data types for books and chapters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a book's content comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BookKind {
    /// Imported into local storage.
    Local,
    /// Served by a remote book source.
    #[default]
    Network,
}

/// A book on the shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Stable identity; never changes after creation.
    pub book_id: String,

    /// Book title.
    pub title: String,

    /// Author name.
    pub author: String,

    /// Optional cover image location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,

    /// Optional short description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,

    /// Zero-based index of the chapter last read.
    pub current_chapter: usize,

    /// Number of chapters in the book.
    pub total_chapters: usize,

    /// Content origin.
    #[serde(default)]
    pub kind: BookKind,

    /// Whether new chapters arrived since the last read.
    #[serde(default)]
    pub has_unread: bool,

    /// When the book was last opened.
    #[serde(default)]
    pub last_read_time: Option<DateTime<Utc>>,

    /// When the book was added to the shelf.
    pub added_at: DateTime<Utc>,
}

impl Book {
    /// Creates a new book with a fresh id, positioned at the first chapter.
    pub fn new(title: impl Into<String>, author: impl Into<String>, total_chapters: usize) -> Self {
        Self {
            book_id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            author: author.into(),
            cover_url: None,
            intro: None,
            current_chapter: 0,
            total_chapters,
            kind: BookKind::Network,
            has_unread: false,
            last_read_time: None,
            added_at: Utc::now(),
        }
    }

    /// Reading progress as a percentage of chapters.
    pub fn progress_percentage(&self) -> f64 {
        if self.total_chapters == 0 {
            return 0.0;
        }
        self.current_chapter as f64 / self.total_chapters as f64 * 100.0
    }

    /// Returns true once the reader has moved past the last chapter.
    pub fn is_finished(&self) -> bool {
        self.current_chapter >= self.total_chapters
    }
}

/// A single chapter of a book.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chapter {
    /// Identifier unique within the owning book.
    pub chapter_id: String,

    /// Owning book (back-reference only).
    pub book_id: String,

    /// Zero-based position in the catalog.
    pub index: usize,

    /// Chapter title, may be empty.
    pub title: String,
}

impl Chapter {
    /// Title for display, falling back to the chapter number.
    pub fn display_name(&self) -> String {
        if self.title.is_empty() {
            format!("Chapter {}", self.index + 1)
        } else {
            self.title.clone()
        }
    }
}
