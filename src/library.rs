//! Service container for the reading core.
//!
//! Builds every store from one preference store and configuration and
//! hands them to reader sessions, so nothing relies on global state.

use crate::bookshelf::{Bookshelf, BookshelfStore};
use crate::catalog::ChapterCatalog;
use crate::config::Config;
use crate::content::{ChapterFetcher, ContentStore, MockChapterSource};
use crate::error::{SessionError, StorageError};
use crate::progress::ProgressStore;
use crate::search::BookSearch;
use crate::session::ReaderSession;
use crate::settings::SettingsStore;
use crate::sources::BookSourceStore;
use crate::stats::ReadingStatsStore;
use crate::storage::PreferenceStore;
use std::sync::Arc;
use tracing::info;

/// All services of the reading core, wired together.
pub struct Library {
    config: Config,
    bookshelf: Arc<BookshelfStore>,
    progress: Arc<ProgressStore>,
    settings: SettingsStore,
    sources: BookSourceStore,
    stats: ReadingStatsStore,
    content: ContentStore,
    search: BookSearch,
}

impl Library {
    /// Wires the services using the mock chapter source.
    pub fn new(prefs: Arc<dyn PreferenceStore>, config: Config) -> Self {
        let fetcher = Arc::new(MockChapterSource::new(&config.source));
        Self::with_fetcher(prefs, fetcher, config)
    }

    /// Wires the services around a specific chapter source.
    pub fn with_fetcher(
        prefs: Arc<dyn PreferenceStore>,
        fetcher: Arc<dyn ChapterFetcher>,
        config: Config,
    ) -> Self {
        let bookshelf = Arc::new(BookshelfStore::new(prefs.clone()));
        let progress = Arc::new(ProgressStore::new(prefs.clone(), bookshelf.clone()));
        let settings = SettingsStore::new(prefs.clone());
        let sources = BookSourceStore::new(prefs.clone());
        let stats = ReadingStatsStore::new(prefs);
        let content = ContentStore::new(fetcher, config.cache.max_chapters);
        let search = BookSearch::new(&config.source);

        Self {
            config,
            bookshelf,
            progress,
            settings,
            sources,
            stats,
            content,
            search,
        }
    }

    /// Opens a reader session for a book on the shelf.
    ///
    /// The chapter catalog is generated here, once per session.
    pub fn open_session(&self, book_id: &str) -> Result<ReaderSession, SessionError> {
        let book = self
            .bookshelf
            .get_book(book_id)?
            .ok_or_else(|| SessionError::BookNotFound(book_id.to_string()))?;
        let catalog = ChapterCatalog::generate(&book);

        ReaderSession::new(
            book,
            catalog,
            self.content.clone(),
            self.progress.clone(),
            &self.config.reader,
        )
    }

    /// Removes a book together with its progress and cached chapters.
    pub fn remove_book(&self, book_id: &str) -> Result<(), StorageError> {
        self.bookshelf.remove_book(book_id)?;
        self.progress.remove(book_id)?;
        self.content.clear_book(book_id);
        info!(book_id, "Removed book");
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn bookshelf(&self) -> &BookshelfStore {
        &self.bookshelf
    }

    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn sources(&self) -> &BookSourceStore {
        &self.sources
    }

    pub fn stats(&self) -> &ReadingStatsStore {
        &self.stats
    }

    pub fn content(&self) -> &ContentStore {
        &self.content
    }

    pub fn search(&self) -> &BookSearch {
        &self.search
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Book;
    use crate::session::ReaderState;
    use crate::storage::MemoryPreferences;

    fn library() -> Library {
        let mut config = Config::default();
        config.source.chapter_latency_ms = 0;
        config.source.search_latency_ms = 0;
        Library::new(Arc::new(MemoryPreferences::new()), config)
    }

    #[tokio::test]
    async fn test_open_session_for_shelved_book() {
        let library = library();
        let mut book = Book::new("Journey to the West", "Wu Cheng'en", 100);
        book.current_chapter = 12;
        let id = book.book_id.clone();
        library.bookshelf().add(book).unwrap();

        let mut session = library.open_session(&id).unwrap();
        assert_eq!(session.state(), &ReaderState::Loading { index: 12 });
        session.start().await;
        assert_eq!(session.state(), &ReaderState::Ready { index: 12 });
    }

    #[test]
    fn test_open_unknown_book() {
        let library = library();
        assert!(matches!(
            library.open_session("nope"),
            Err(SessionError::BookNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_book_clears_everything() {
        let library = library();
        let book = Book::new("Life", "Lu Yao", 3);
        let id = book.book_id.clone();
        library.bookshelf().add(book).unwrap();

        let mut session = library.open_session(&id).unwrap();
        session.start().await;
        session.settle_prefetch().await;
        assert!(library.progress().load(&id).unwrap().is_some());
        assert_eq!(library.content().stats().entries, 3);

        library.remove_book(&id).unwrap();
        assert!(library.bookshelf().get_book(&id).unwrap().is_none());
        assert!(library.progress().load(&id).unwrap().is_none());
        assert_eq!(library.content().stats().entries, 0);
    }

    #[test]
    fn test_sources_and_stats_persist_with_preferences() {
        let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferences::new());
        let first = Library::new(prefs.clone(), Config::default());
        first
            .sources()
            .add(crate::sources::BookSource::new("Archive", "https://archive.example"))
            .unwrap();
        first.stats().add_record("b1", "Life", "Chapter 1", 0).unwrap();

        let second = Library::new(prefs, Config::default());
        assert!(second.sources().by_name("Archive").unwrap().is_some());
        assert_eq!(second.stats().books_read().unwrap(), 1);
    }
}
