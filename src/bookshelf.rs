//! Bookshelf persistence.
//!
//! The whole shelf is one JSON list stored under a single preference key;
//! every mutation is a full read-modify-write of that list, serialized by
//! the store's write lock.

use crate::error::StorageError;
use crate::models::{Book, BookKind};
use crate::storage::{PreferenceStore, read_json, write_guard, write_json};
use std::sync::{Arc, Mutex};

/// Preference key holding the shelf.
const BOOKS_KEY: &str = "shiori.books";

/// The bookshelf operations other services depend on.
pub trait Bookshelf: Send + Sync {
    /// Looks up a book by id.
    fn get_book(&self, book_id: &str) -> Result<Option<Book>, StorageError>;

    /// Replaces a book's stored record. Does nothing if the book is absent.
    fn update_book(&self, book: &Book) -> Result<(), StorageError>;
}

/// Bookshelf backed by a preference store.
pub struct BookshelfStore {
    prefs: Arc<dyn PreferenceStore>,
    write_lock: Mutex<()>,
}

impl BookshelfStore {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self {
            prefs,
            write_lock: Mutex::new(()),
        }
    }

    /// All books, most recently added first.
    pub fn all(&self) -> Result<Vec<Book>, StorageError> {
        let mut books = self.load()?;
        books.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        Ok(books)
    }

    /// Adds a book, replacing any existing book with the same id.
    pub fn add(&self, book: Book) -> Result<(), StorageError> {
        let _guard = write_guard(&self.write_lock);
        let mut books = self.load()?;
        match books.iter_mut().find(|b| b.book_id == book.book_id) {
            Some(existing) => *existing = book,
            None => books.push(book),
        }
        self.store(&books)
    }

    /// Removes a book. Removing an absent book is not an error.
    pub fn remove_book(&self, book_id: &str) -> Result<(), StorageError> {
        self.remove_books(&[book_id])
    }

    /// Removes several books at once.
    pub fn remove_books(&self, book_ids: &[&str]) -> Result<(), StorageError> {
        let _guard = write_guard(&self.write_lock);
        let mut books = self.load()?;
        let before = books.len();
        books.retain(|b| !book_ids.contains(&b.book_id.as_str()));
        if books.len() == before {
            return Ok(());
        }
        self.store(&books)
    }

    /// Empties the shelf.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        let _guard = write_guard(&self.write_lock);
        self.prefs.remove(BOOKS_KEY)
    }

    /// Fills an empty shelf with sample books. Returns how many were added.
    pub fn seed_samples(&self) -> Result<usize, StorageError> {
        let _guard = write_guard(&self.write_lock);
        if !self.load()?.is_empty() {
            return Ok(0);
        }

        let samples = sample_books();
        let count = samples.len();
        self.store(&samples)?;
        Ok(count)
    }

    fn load(&self) -> Result<Vec<Book>, StorageError> {
        Ok(read_json(self.prefs.as_ref(), BOOKS_KEY)?.unwrap_or_default())
    }

    fn store(&self, books: &[Book]) -> Result<(), StorageError> {
        write_json(self.prefs.as_ref(), BOOKS_KEY, &books)
    }
}

impl Bookshelf for BookshelfStore {
    fn get_book(&self, book_id: &str) -> Result<Option<Book>, StorageError> {
        Ok(self.load()?.into_iter().find(|b| b.book_id == book_id))
    }

    fn update_book(&self, book: &Book) -> Result<(), StorageError> {
        let _guard = write_guard(&self.write_lock);
        let mut books = self.load()?;
        let Some(existing) = books.iter_mut().find(|b| b.book_id == book.book_id) else {
            return Ok(());
        };
        *existing = book.clone();
        self.store(&books)
    }
}

fn sample_books() -> Vec<Book> {
    let specs: [(&str, &str, usize, usize, BookKind); 6] = [
        ("The Three-Body Problem", "Liu Cixin", 3, 46, BookKind::Network),
        ("The Wandering Earth", "Liu Cixin", 0, 1, BookKind::Network),
        ("To Live", "Yu Hua", 8, 12, BookKind::Local),
        ("Ordinary World", "Lu Yao", 0, 106, BookKind::Network),
        ("Dream of the Red Chamber", "Cao Xueqin", 20, 120, BookKind::Local),
        ("White Deer Plain", "Chen Zhongshi", 5, 50, BookKind::Network),
    ];

    specs
        .into_iter()
        .map(|(title, author, current, total, kind)| {
            let mut book = Book::new(title, author, total);
            book.current_chapter = current;
            book.kind = kind;
            book
        })
        .collect()
}
