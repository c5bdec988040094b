//! Reading progress persistence.
//!
//! Stores one record per book (chapter index, scroll offset, last read
//! time) and writes the position through to the bookshelf.

use crate::bookshelf::Bookshelf;
use crate::error::{PersistenceError, StorageError};
use crate::storage::{PreferenceStore, read_json, write_guard, write_json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Preference key holding every book's progress record.
const PROGRESS_KEY: &str = "shiori.reading_progress";

/// Saved reading position for one book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingProgress {
    pub book_id: String,
    pub chapter_index: usize,
    /// Never negative.
    pub scroll_offset: f64,
    pub last_read_time: DateTime<Utc>,
}

/// Progress store with bookshelf write-through.
///
/// Saves for one book are last-writer-wins. All books share one record
/// map, so every read-modify-write of it holds `write_lock`.
pub struct ProgressStore {
    prefs: Arc<dyn PreferenceStore>,
    bookshelf: Arc<dyn Bookshelf>,
    write_lock: Mutex<()>,
}

impl ProgressStore {
    pub fn new(prefs: Arc<dyn PreferenceStore>, bookshelf: Arc<dyn Bookshelf>) -> Self {
        Self {
            prefs,
            bookshelf,
            write_lock: Mutex::new(()),
        }
    }

    /// Upserts the progress record for a book.
    ///
    /// The record's timestamp is never earlier than the one it replaces.
    /// After the record is durable the book's current chapter is updated
    /// on the bookshelf; a failure there is logged and otherwise ignored.
    pub fn save(
        &self,
        book_id: &str,
        chapter_index: usize,
        scroll_offset: f64,
    ) -> Result<ReadingProgress, StorageError> {
        let progress = {
            let _guard = write_guard(&self.write_lock);
            let mut records = self.load_all()?;

            let now = Utc::now();
            let last_read_time = match records.get(book_id) {
                Some(previous) if previous.last_read_time > now => previous.last_read_time,
                _ => now,
            };

            let progress = ReadingProgress {
                book_id: book_id.to_string(),
                chapter_index,
                scroll_offset: sanitize_offset(scroll_offset),
                last_read_time,
            };

            records.insert(book_id.to_string(), progress.clone());
            write_json(self.prefs.as_ref(), PROGRESS_KEY, &records)?;
            progress
        };
        debug!(book_id, chapter_index, "Saved reading progress");

        if let Err(err) = self.write_through(&progress) {
            warn!(book_id, error = %err, "Progress saved but bookshelf not updated");
        }

        Ok(progress)
    }

    /// Returns the saved progress for a book, if it has been read.
    pub fn load(&self, book_id: &str) -> Result<Option<ReadingProgress>, StorageError> {
        Ok(self.load_all()?.remove(book_id))
    }

    /// Deletes a book's progress. Idempotent.
    pub fn remove(&self, book_id: &str) -> Result<(), StorageError> {
        let _guard = write_guard(&self.write_lock);
        let mut records = self.load_all()?;
        if records.remove(book_id).is_none() {
            return Ok(());
        }
        write_json(self.prefs.as_ref(), PROGRESS_KEY, &records)
    }

    /// Every stored progress record.
    pub fn all(&self) -> Result<Vec<ReadingProgress>, StorageError> {
        Ok(self.load_all()?.into_values().collect())
    }

    /// Deletes all progress records.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        let _guard = write_guard(&self.write_lock);
        self.prefs.remove(PROGRESS_KEY)
    }

    fn load_all(&self) -> Result<HashMap<String, ReadingProgress>, StorageError> {
        Ok(read_json(self.prefs.as_ref(), PROGRESS_KEY)?.unwrap_or_default())
    }

    fn write_through(&self, progress: &ReadingProgress) -> Result<(), PersistenceError> {
        let mut book = self
            .bookshelf
            .get_book(&progress.book_id)?
            .ok_or_else(|| PersistenceError::BookMissing(progress.book_id.clone()))?;

        book.current_chapter = progress.chapter_index;
        book.last_read_time = Some(progress.last_read_time);
        self.bookshelf.update_book(&book)?;
        Ok(())
    }
}

fn sanitize_offset(offset: f64) -> f64 {
    if offset.is_finite() && offset > 0.0 {
        offset
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookshelf::BookshelfStore;
    use crate::models::Book;
    use crate::storage::MemoryPreferences;

    struct BrokenShelf;

    impl Bookshelf for BrokenShelf {
        fn get_book(&self, _book_id: &str) -> Result<Option<Book>, StorageError> {
            Err(std::io::Error::other("shelf offline").into())
        }

        fn update_book(&self, _book: &Book) -> Result<(), StorageError> {
            Err(std::io::Error::other("shelf offline").into())
        }
    }

    fn stores() -> (ProgressStore, Arc<BookshelfStore>) {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferences::new());
        let shelf = Arc::new(BookshelfStore::new(prefs.clone()));
        (ProgressStore::new(prefs, shelf.clone()), shelf)
    }

    #[test]
    fn test_save_then_load() {
        let (progress, _) = stores();
        progress.save("book-1", 4, 120.5).unwrap();

        let record = progress.load("book-1").unwrap().unwrap();
        assert_eq!(record.chapter_index, 4);
        assert_eq!(record.scroll_offset, 120.5);
        assert!(progress.load("book-2").unwrap().is_none());
    }

    #[test]
    fn test_last_write_wins() {
        let (progress, _) = stores();
        progress.save("book-1", 4, 10.0).unwrap();
        progress.save("book-1", 2, 0.0).unwrap();

        let record = progress.load("book-1").unwrap().unwrap();
        assert_eq!(record.chapter_index, 2);
        assert_eq!(progress.all().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (progress, _) = stores();
        progress.save("book-1", 1, 0.0).unwrap();

        progress.remove("book-1").unwrap();
        progress.remove("book-1").unwrap();
        assert!(progress.load("book-1").unwrap().is_none());
    }

    #[test]
    fn test_negative_offset_clamped() {
        let (progress, _) = stores();
        assert_eq!(progress.save("b", 0, -5.0).unwrap().scroll_offset, 0.0);
        assert_eq!(progress.save("b", 0, f64::NAN).unwrap().scroll_offset, 0.0);
    }

    #[test]
    fn test_last_read_time_never_goes_backwards() {
        let (progress, _) = stores();
        let first = progress.save("b", 0, 0.0).unwrap();
        let second = progress.save("b", 1, 0.0).unwrap();
        assert!(second.last_read_time >= first.last_read_time);
    }

    #[test]
    fn test_write_through_updates_book() {
        let (progress, shelf) = stores();
        let book = Book::new("The Three-Body Problem", "Liu Cixin", 46);
        let id = book.book_id.clone();
        shelf.add(book).unwrap();

        let saved = progress.save(&id, 7, 0.0).unwrap();

        let book = shelf.get_book(&id).unwrap().unwrap();
        assert_eq!(book.current_chapter, 7);
        assert_eq!(book.last_read_time, Some(saved.last_read_time));
    }

    #[test]
    fn test_missing_book_does_not_fail_save() {
        let (progress, _) = stores();
        assert!(progress.save("not-on-shelf", 3, 0.0).is_ok());
        assert_eq!(progress.load("not-on-shelf").unwrap().unwrap().chapter_index, 3);
    }

    #[test]
    fn test_broken_shelf_keeps_progress_durable() {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferences::new());
        let progress = ProgressStore::new(prefs, Arc::new(BrokenShelf));

        progress.save("b", 2, 0.0).unwrap();
        assert_eq!(progress.load("b").unwrap().unwrap().chapter_index, 2);
    }

    #[test]
    fn test_clear_all() {
        let (progress, _) = stores();
        progress.save("a", 0, 0.0).unwrap();
        progress.save("b", 0, 0.0).unwrap();
        progress.clear_all().unwrap();
        assert!(progress.all().unwrap().is_empty());
    }

    #[test]
    fn test_parallel_saves_for_different_books_all_land() {
        for _ in 0..20 {
            let (progress, shelf) = stores();
            let progress = Arc::new(progress);
            let ids: Vec<String> = (0..8)
                .map(|_| {
                    let book = Book::new("Brothers", "Yu Hua", 20);
                    let id = book.book_id.clone();
                    shelf.add(book).unwrap();
                    id
                })
                .collect();

            let handles: Vec<_> = ids
                .iter()
                .enumerate()
                .map(|(chapter, id)| {
                    let progress = progress.clone();
                    let id = id.clone();
                    std::thread::spawn(move || progress.save(&id, chapter, 0.0).unwrap())
                })
                .collect();
            for handle in handles {
                handle.join().unwrap();
            }

            assert_eq!(progress.all().unwrap().len(), 8);
            for (chapter, id) in ids.iter().enumerate() {
                assert_eq!(progress.load(id).unwrap().unwrap().chapter_index, chapter);
                let book = shelf.get_book(id).unwrap().unwrap();
                assert_eq!(book.current_chapter, chapter);
            }
        }
    }
}
