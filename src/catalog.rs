//! Chapter catalog generation.
//!
//! A catalog is the ordered list of a book's chapters for one reading
//! session. It is generated once and never mutated afterwards.

use crate::models::{Book, Chapter};

/// Ordered, zero-based sequence of chapters for one book.
///
/// Invariant: `catalog.get(i).index == i` for every `i < len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterCatalog {
    book_id: String,
    chapters: Vec<Chapter>,
}

impl ChapterCatalog {
    /// Generates the catalog for a book.
    ///
    /// Produces exactly `book.total_chapters` entries. Ids and titles are
    /// derived from the book id and index only, so regenerating yields an
    /// identical catalog.
    pub fn generate(book: &Book) -> Self {
        let chapters = (0..book.total_chapters)
            .map(|index| Chapter {
                chapter_id: chapter_id(&book.book_id, index),
                book_id: book.book_id.clone(),
                index,
                title: format!("Chapter {}", index + 1),
            })
            .collect();

        Self {
            book_id: book.book_id.clone(),
            chapters,
        }
    }

    /// The book this catalog belongs to.
    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Returns the chapter at `index`, if any.
    pub fn get(&self, index: usize) -> Option<&Chapter> {
        self.chapters.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chapter> {
        self.chapters.iter()
    }

    /// Checks that a chapter is the exact entry of this catalog at its index.
    pub fn contains(&self, chapter: &Chapter) -> bool {
        chapter.book_id == self.book_id
            && self
                .chapters
                .get(chapter.index)
                .is_some_and(|c| c.chapter_id == chapter.chapter_id)
    }

    /// Human readable position, e.g. `3/46`.
    pub fn progress_label(&self, index: usize) -> String {
        format!("{}/{}", index + 1, self.chapters.len())
    }
}

fn chapter_id(book_id: &str, index: usize) -> String {
    format!("{}:{:05}", book_id, index)
}
