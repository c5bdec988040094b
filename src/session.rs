//! Reader session: which chapter is shown and how it gets there.
//!
//! A session owns the current chapter pointer for one open book. Each
//! navigation bumps a generation counter and starts a content load; a load
//! only updates the session if it is still the latest one when it lands.
//! Successful loads persist progress and prefetch the following chapters.

use crate::catalog::ChapterCatalog;
use crate::config::ReaderConfig;
use crate::content::{ContentStore, FetchResult};
use crate::error::{FetchError, InvalidChapterError, SessionError, StorageError};
use crate::models::{Book, Chapter};
use crate::pagination::{Page, paginate};
use crate::progress::{ProgressStore, ReadingProgress};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// What the reader is currently doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    /// Waiting for the chapter's content.
    Loading { index: usize },
    /// The chapter's content is displayed.
    Ready { index: usize },
    /// Loading the chapter failed; the previous content stays displayed.
    Failed { index: usize, error: FetchError },
}

impl ReaderState {
    /// The chapter this state refers to.
    pub fn index(&self) -> usize {
        match self {
            ReaderState::Loading { index }
            | ReaderState::Ready { index }
            | ReaderState::Failed { index, .. } => *index,
        }
    }

    /// True while a chapter load is outstanding.
    pub fn is_loading(&self) -> bool {
        matches!(self, ReaderState::Loading { .. })
    }

    /// The load error, if the last load failed.
    pub fn error(&self) -> Option<&FetchError> {
        match self {
            ReaderState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// The chapter text currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayedChapter {
    pub index: usize,
    pub title: String,
    pub text: Arc<str>,
}

/// Result of applying a finished load to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The chapter is now displayed.
    Ready,
    /// The load failed; the session is in `Failed`.
    Failed,
    /// A newer navigation superseded this load; nothing changed.
    Stale,
}

/// A content load started by [`ReaderSession::request`].
#[derive(Debug)]
pub struct PendingLoad {
    generation: u64,
    index: usize,
    task: JoinHandle<FetchResult>,
}

impl PendingLoad {
    /// Target chapter of this load.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Waits for the content to arrive.
    pub async fn wait(self) -> CompletedLoad {
        let result = self
            .task
            .await
            .unwrap_or_else(|e| Err(FetchError::Interrupted(e.to_string())));

        CompletedLoad {
            generation: self.generation,
            index: self.index,
            result,
        }
    }
}

/// A finished load, ready to be applied with [`ReaderSession::apply`].
#[derive(Debug)]
pub struct CompletedLoad {
    generation: u64,
    index: usize,
    result: FetchResult,
}

impl CompletedLoad {
    /// The chapter this load was for.
    pub fn index(&self) -> usize {
        self.index
    }

    /// True if the chapter text arrived.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Navigation state for one open book.
pub struct ReaderSession {
    book: Book,
    catalog: ChapterCatalog,
    content: ContentStore,
    progress: Arc<ProgressStore>,
    prefetch_count: usize,
    state: ReaderState,
    displayed: Option<DisplayedChapter>,
    generation: u64,
    saved: Option<ReadingProgress>,
    prefetches: Vec<JoinHandle<()>>,
}

impl ReaderSession {
    /// Creates a session positioned at the chapter to resume from.
    ///
    /// The starting chapter is the saved progress if it fits the catalog,
    /// otherwise the book's own current chapter clamped into the catalog.
    /// The session starts in `Loading`; call [`start`](Self::start) to load it.
    pub fn new(
        book: Book,
        catalog: ChapterCatalog,
        content: ContentStore,
        progress: Arc<ProgressStore>,
        config: &ReaderConfig,
    ) -> Result<Self, SessionError> {
        if catalog.book_id() != book.book_id {
            return Err(SessionError::CatalogMismatch {
                book: book.book_id.clone(),
                catalog: catalog.book_id().to_string(),
            });
        }
        if catalog.is_empty() {
            return Err(SessionError::EmptyCatalog(book.book_id.clone()));
        }

        let saved = progress.load(&book.book_id)?;
        let initial = match &saved {
            Some(record) if record.chapter_index < catalog.len() => record.chapter_index,
            _ => book.current_chapter.min(catalog.len() - 1),
        };

        Ok(Self {
            book,
            catalog,
            content,
            progress,
            prefetch_count: config.prefetch_count,
            state: ReaderState::Loading { index: initial },
            displayed: None,
            generation: 0,
            saved,
            prefetches: Vec::new(),
        })
    }

    /// Loads the starting chapter.
    pub async fn start(&mut self) -> LoadOutcome {
        let index = self.state.index();
        match self.navigate(index).await {
            Ok(outcome) => outcome,
            // The starting index is always within the catalog.
            Err(_) => LoadOutcome::Failed,
        }
    }

    /// Starts loading a chapter and makes it the navigation target.
    ///
    /// Any load still outstanding becomes stale.
    pub fn request(&mut self, index: usize) -> Result<PendingLoad, InvalidChapterError> {
        let chapter = self
            .catalog
            .get(index)
            .cloned()
            .ok_or(InvalidChapterError::OutOfRange {
                index,
                len: self.catalog.len(),
            })?;

        self.generation += 1;
        self.state = ReaderState::Loading { index };
        debug!(
            book_id = %self.book.book_id,
            index,
            generation = self.generation,
            "Loading chapter"
        );

        let content = self.content.clone();
        let task = tokio::spawn(async move { content.get(&chapter).await });

        Ok(PendingLoad {
            generation: self.generation,
            index,
            task,
        })
    }

    /// Applies a finished load if it is still the latest navigation.
    pub fn apply(&mut self, load: CompletedLoad) -> LoadOutcome {
        if load.generation != self.generation {
            debug!(
                index = load.index,
                generation = load.generation,
                current = self.generation,
                "Discarding stale chapter load"
            );
            return LoadOutcome::Stale;
        }

        match load.result {
            Ok(text) => {
                let title = self
                    .catalog
                    .get(load.index)
                    .map(Chapter::display_name)
                    .unwrap_or_default();
                self.displayed = Some(DisplayedChapter {
                    index: load.index,
                    title,
                    text,
                });
                self.state = ReaderState::Ready { index: load.index };
                self.persist(load.index);
                self.schedule_prefetch(load.index);
                LoadOutcome::Ready
            }
            Err(error) => {
                debug!(index = load.index, error = %error, "Chapter load failed");
                self.state = ReaderState::Failed {
                    index: load.index,
                    error,
                };
                LoadOutcome::Failed
            }
        }
    }

    /// Loads a chapter by index and applies the result.
    pub async fn navigate(&mut self, index: usize) -> Result<LoadOutcome, InvalidChapterError> {
        let pending = self.request(index)?;
        let completed = pending.wait().await;
        Ok(self.apply(completed))
    }

    /// Moves to the next chapter. Returns false at the last chapter.
    pub async fn next(&mut self) -> bool {
        if !self.can_go_next() {
            return false;
        }
        let target = self.state.index() + 1;
        self.navigate(target).await.is_ok()
    }

    /// Moves to the previous chapter. Returns false at the first chapter.
    pub async fn previous(&mut self) -> bool {
        let Some(target) = self.state.index().checked_sub(1) else {
            return false;
        };
        self.navigate(target).await.is_ok()
    }

    /// Jumps to a chapter of this session's catalog.
    pub async fn jump(&mut self, chapter: &Chapter) -> Result<LoadOutcome, InvalidChapterError> {
        if chapter.book_id != self.catalog.book_id() {
            return Err(InvalidChapterError::ForeignBook {
                expected: self.catalog.book_id().to_string(),
                found: chapter.book_id.clone(),
            });
        }
        if !self.catalog.contains(chapter) {
            return Err(InvalidChapterError::UnknownChapter(
                chapter.chapter_id.clone(),
            ));
        }
        self.navigate(chapter.index).await
    }

    /// Re-issues the load for the current target chapter.
    pub async fn retry(&mut self) -> LoadOutcome {
        let index = self.state.index();
        self.navigate(index).await.unwrap_or(LoadOutcome::Failed)
    }

    /// Persists the scroll position within the displayed chapter.
    pub fn update_scroll(&mut self, offset: f64) -> Result<(), StorageError> {
        let Some(displayed) = &self.displayed else {
            return Ok(());
        };
        let record = self
            .progress
            .save(&self.book.book_id, displayed.index, offset)?;
        self.saved = Some(record);
        Ok(())
    }

    /// Saved scroll offset for the displayed chapter, if any.
    pub fn resume_offset(&self) -> Option<f64> {
        let displayed = self.displayed.as_ref()?;
        self.saved
            .as_ref()
            .filter(|record| record.chapter_index == displayed.index)
            .map(|record| record.scroll_offset)
    }

    /// Paginates the displayed chapter.
    pub fn pages(&self, chars_per_page: usize) -> Vec<Page> {
        self.displayed
            .as_ref()
            .map(|d| paginate(&d.text, chars_per_page))
            .unwrap_or_default()
    }

    /// Waits for every prefetch started so far.
    pub async fn settle_prefetch(&mut self) {
        futures::future::join_all(std::mem::take(&mut self.prefetches)).await;
    }

    /// True unless the target chapter is the last one.
    pub fn can_go_next(&self) -> bool {
        self.state.index() + 1 < self.catalog.len()
    }

    /// True unless the target chapter is the first one.
    pub fn can_go_previous(&self) -> bool {
        self.state.index() > 0
    }

    /// Position label such as `3/46`.
    pub fn progress_label(&self) -> String {
        self.catalog.progress_label(self.state.index())
    }

    /// Current navigation state.
    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    /// The chapter on screen, if any has loaded yet.
    pub fn displayed(&self) -> Option<&DisplayedChapter> {
        self.displayed.as_ref()
    }

    /// The open book.
    pub fn book(&self) -> &Book {
        &self.book
    }

    /// The open book's chapter catalog.
    pub fn catalog(&self) -> &ChapterCatalog {
        &self.catalog
    }

    fn persist(&mut self, index: usize) {
        // Keep the saved offset when reopening the chapter it belongs to.
        let offset = self
            .saved
            .as_ref()
            .filter(|record| record.chapter_index == index)
            .map_or(0.0, |record| record.scroll_offset);

        match self.progress.save(&self.book.book_id, index, offset) {
            Ok(record) => self.saved = Some(record),
            Err(err) => {
                warn!(book_id = %self.book.book_id, index, error = %err, "Failed to save progress");
            }
        }
    }

    fn schedule_prefetch(&mut self, index: usize) {
        self.prefetches.retain(|handle| !handle.is_finished());
        let handles = self
            .content
            .prefetch(index + 1, self.prefetch_count, &self.catalog);
        self.prefetches.extend(handles);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bookshelf::BookshelfStore;
    use crate::content::ChapterFetcher;
    use crate::storage::{MemoryPreferences, PreferenceStore};
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct StubFetcher {
        calls: Mutex<Vec<usize>>,
        failing: Mutex<HashSet<usize>>,
        gates: Mutex<HashMap<usize, Arc<Notify>>>,
    }

    impl StubFetcher {
        fn hold(&self, index: usize) -> Arc<Notify> {
            let gate = Arc::new(Notify::new());
            self.gates.lock().unwrap().insert(index, gate.clone());
            gate
        }

        fn calls(&self) -> Vec<usize> {
            let mut calls = self.calls.lock().unwrap().clone();
            calls.sort_unstable();
            calls
        }
    }

    #[async_trait]
    impl ChapterFetcher for StubFetcher {
        fn name(&self) -> &'static str {
            "Stub"
        }

        async fn fetch(&self, chapter: &Chapter) -> Result<String, FetchError> {
            self.calls.lock().unwrap().push(chapter.index);
            let gate = self.gates.lock().unwrap().get(&chapter.index).cloned();
            if let Some(gate) = gate {
                gate.notified().await;
            }
            if self.failing.lock().unwrap().contains(&chapter.index) {
                return Err(FetchError::Unavailable("source offline".to_string()));
            }
            Ok(format!("T{}", chapter.index))
        }
    }

    struct Fixture {
        fetcher: Arc<StubFetcher>,
        content: ContentStore,
        progress: Arc<ProgressStore>,
        shelf: Arc<BookshelfStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let prefs: Arc<dyn PreferenceStore> = Arc::new(MemoryPreferences::new());
            let shelf = Arc::new(BookshelfStore::new(prefs.clone()));
            let fetcher = Arc::new(StubFetcher::default());
            Self {
                content: ContentStore::new(fetcher.clone(), 32),
                progress: Arc::new(ProgressStore::new(prefs, shelf.clone())),
                fetcher,
                shelf,
            }
        }

        fn book(&self, chapters: usize) -> Book {
            let book = Book::new("The Three-Body Problem", "Liu Cixin", chapters);
            self.shelf.add(book.clone()).unwrap();
            book
        }

        fn session(&self, book: &Book) -> ReaderSession {
            ReaderSession::new(
                book.clone(),
                ChapterCatalog::generate(book),
                self.content.clone(),
                self.progress.clone(),
                &ReaderConfig::default(),
            )
            .unwrap()
        }
    }

    #[tokio::test]
    async fn test_initial_state_defaults_to_first_chapter() {
        let fx = Fixture::new();
        let book = fx.book(3);
        let session = fx.session(&book);
        assert_eq!(session.state(), &ReaderState::Loading { index: 0 });
        assert!(session.displayed().is_none());
    }

    #[tokio::test]
    async fn test_initial_index_prefers_saved_progress() {
        let fx = Fixture::new();
        let mut book = fx.book(10);
        book.current_chapter = 4;
        fx.progress.save(&book.book_id, 7, 30.0).unwrap();

        let session = fx.session(&book);
        assert_eq!(session.state().index(), 7);
    }

    #[tokio::test]
    async fn test_initial_index_ignores_out_of_range_progress() {
        let fx = Fixture::new();
        let mut book = fx.book(5);
        fx.progress.save(&book.book_id, 42, 0.0).unwrap();
        book.current_chapter = 9;

        let session = fx.session(&book);
        assert_eq!(session.state().index(), 4);
    }

    #[tokio::test]
    async fn test_empty_and_mismatched_catalogs_rejected() {
        let fx = Fixture::new();
        let empty = fx.book(0);
        let result = ReaderSession::new(
            empty.clone(),
            ChapterCatalog::generate(&empty),
            fx.content.clone(),
            fx.progress.clone(),
            &ReaderConfig::default(),
        );
        assert!(matches!(result, Err(SessionError::EmptyCatalog(_))));

        let book = fx.book(3);
        let other = fx.book(3);
        let result = ReaderSession::new(
            book,
            ChapterCatalog::generate(&other),
            fx.content.clone(),
            fx.progress.clone(),
            &ReaderConfig::default(),
        );
        assert!(matches!(result, Err(SessionError::CatalogMismatch { .. })));
    }

    #[tokio::test]
    async fn test_start_loads_persists_and_prefetches() {
        let fx = Fixture::new();
        let book = fx.book(3);
        let mut session = fx.session(&book);

        assert_eq!(session.start().await, LoadOutcome::Ready);
        assert_eq!(session.state(), &ReaderState::Ready { index: 0 });
        assert_eq!(&*session.displayed().unwrap().text, "T0");

        let saved = fx.progress.load(&book.book_id).unwrap().unwrap();
        assert_eq!(saved.chapter_index, 0);

        session.settle_prefetch().await;
        assert_eq!(fx.fetcher.calls(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_next_and_previous_guards() {
        let fx = Fixture::new();
        let book = fx.book(2);
        let mut session = fx.session(&book);
        session.start().await;

        assert!(!session.previous().await);
        assert_eq!(session.state(), &ReaderState::Ready { index: 0 });

        assert!(session.next().await);
        assert_eq!(session.state(), &ReaderState::Ready { index: 1 });

        assert!(!session.next().await);
        assert_eq!(session.state(), &ReaderState::Ready { index: 1 });
        assert!(!session.can_go_next());
        assert!(session.can_go_previous());
    }

    #[tokio::test]
    async fn test_stale_completion_is_discarded() {
        let fx = Fixture::new();
        let book = fx.book(4);
        let mut session = fx.session(&book);
        let gate = fx.fetcher.hold(2);

        let slow = session.request(2).unwrap();
        let fast = session.request(1).unwrap();

        let fast_done = fast.wait().await;
        assert_eq!(session.apply(fast_done), LoadOutcome::Ready);
        assert_eq!(session.state(), &ReaderState::Ready { index: 1 });

        gate.notify_one();
        let slow_done = slow.wait().await;
        assert!(slow_done.is_ok());
        assert_eq!(session.apply(slow_done), LoadOutcome::Stale);
        assert_eq!(session.state(), &ReaderState::Ready { index: 1 });
        assert_eq!(&*session.displayed().unwrap().text, "T1");
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_text() {
        let fx = Fixture::new();
        let book = fx.book(3);
        fx.fetcher.failing.lock().unwrap().insert(1);
        let mut session = fx.session(&book);
        session.start().await;

        assert_eq!(session.navigate(1).await, Ok(LoadOutcome::Failed));
        assert_eq!(
            session.state().error(),
            Some(&FetchError::Unavailable("source offline".to_string()))
        );
        let displayed = session.displayed().unwrap();
        assert_eq!(displayed.index, 0);
        assert_eq!(&*displayed.text, "T0");

        let saved = fx.progress.load(&book.book_id).unwrap().unwrap();
        assert_eq!(saved.chapter_index, 0);

        fx.fetcher.failing.lock().unwrap().clear();
        assert_eq!(session.retry().await, LoadOutcome::Ready);
        assert_eq!(session.state(), &ReaderState::Ready { index: 1 });
    }

    #[tokio::test]
    async fn test_jump_validates_chapter() {
        let fx = Fixture::new();
        let book = fx.book(5);
        let other = fx.book(5);
        let mut session = fx.session(&book);

        let foreign = ChapterCatalog::generate(&other).get(3).unwrap().clone();
        assert!(matches!(
            session.jump(&foreign).await,
            Err(InvalidChapterError::ForeignBook { .. })
        ));

        let mut forged = session.catalog().get(3).unwrap().clone();
        forged.chapter_id = "forged".to_string();
        assert!(matches!(
            session.jump(&forged).await,
            Err(InvalidChapterError::UnknownChapter(_))
        ));

        let target = session.catalog().get(3).unwrap().clone();
        assert_eq!(session.jump(&target).await, Ok(LoadOutcome::Ready));
        assert_eq!(session.progress_label(), "4/5");
    }

    #[tokio::test]
    async fn test_out_of_range_navigation_fails_fast() {
        let fx = Fixture::new();
        let book = fx.book(3);
        let mut session = fx.session(&book);
        session.start().await;

        assert_eq!(
            session.navigate(3).await,
            Err(InvalidChapterError::OutOfRange { index: 3, len: 3 })
        );
        assert_eq!(session.state(), &ReaderState::Ready { index: 0 });
    }

    #[tokio::test]
    async fn test_scroll_offset_round_trip() {
        let fx = Fixture::new();
        let book = fx.book(3);
        let mut session = fx.session(&book);
        session.start().await;
        session.update_scroll(250.0).unwrap();

        let mut reopened = fx.session(&book);
        reopened.start().await;
        assert_eq!(reopened.resume_offset(), Some(250.0));

        reopened.next().await;
        assert_eq!(reopened.resume_offset(), Some(0.0));
    }

    #[tokio::test]
    async fn test_write_through_reaches_bookshelf() {
        let fx = Fixture::new();
        let book = fx.book(3);
        let mut session = fx.session(&book);
        session.start().await;
        session.next().await;

        let stored = fx.shelf.all().unwrap();
        let stored = stored.iter().find(|b| b.book_id == book.book_id).unwrap();
        assert_eq!(stored.current_chapter, 1);
        assert!(stored.last_read_time.is_some());
    }

    #[tokio::test]
    async fn test_pages_of_displayed_chapter() {
        let fx = Fixture::new();
        let book = fx.book(1);
        let mut session = fx.session(&book);
        assert!(session.pages(10).is_empty());

        session.start().await;
        let pages = session.pages(10);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].content, "T0");
    }

    #[tokio::test]
    async fn test_next_joins_prefetch_in_flight() {
        let fx = Fixture::new();
        let book = fx.book(5);
        let gate = fx.fetcher.hold(1);
        let mut session = fx.session(&book);
        session.start().await;

        // Let the prefetch of chapter 1 reach the held fetcher.
        while !fx.fetcher.calls().contains(&1) {
            tokio::task::yield_now().await;
        }
        assert!(fx.content.stats().in_flight >= 1);

        let (moved, ()) = tokio::join!(session.next(), async {
            tokio::task::yield_now().await;
            gate.notify_one();
        });

        assert!(moved);
        assert_eq!(session.state(), &ReaderState::Ready { index: 1 });
        assert_eq!(&*session.displayed().unwrap().text, "T1");
        let fetches_of_one = fx.fetcher.calls().iter().filter(|&&i| i == 1).count();
        assert_eq!(fetches_of_one, 1);
    }
}
