//! Chapter content delivery.
//!
//! `ContentStore` maps chapters to their text. A miss starts one fetch
//! through the configured [`ChapterFetcher`]; concurrent requests for the
//! same chapter share that fetch instead of starting their own. Fetched
//! text stays cached until evicted by the LRU bound or cleared.

mod cache;
mod mock;

pub use mock::MockChapterSource;

use crate::catalog::ChapterCatalog;
use crate::error::FetchError;
use crate::models::Chapter;
use async_trait::async_trait;
use cache::LruCache;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome of a content request, shared between all waiters.
pub type FetchResult = Result<Arc<str>, FetchError>;

/// Retrieves chapter text from its source of truth.
///
/// Implementations decide the transport; the store only needs the text or
/// an error.
#[async_trait]
pub trait ChapterFetcher: Send + Sync {
    /// Returns the human-readable name of this source.
    fn name(&self) -> &'static str;

    /// Fetches the full text of one chapter.
    async fn fetch(&self, chapter: &Chapter) -> Result<String, FetchError>;
}

/// Cache key: a chapter within a book.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChapterKey {
    book_id: String,
    chapter_id: String,
}

impl ChapterKey {
    fn of(chapter: &Chapter) -> Self {
        Self {
            book_id: chapter.book_id.clone(),
            chapter_id: chapter.chapter_id.clone(),
        }
    }
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentStats {
    /// Chapters currently cached.
    pub entries: usize,
    /// Maximum number of cached chapters.
    pub capacity: usize,
    /// Size of cached text in bytes.
    pub bytes: usize,
    /// Requests answered from the cache.
    pub hits: u64,
    /// Requests that had to wait for a fetch.
    pub misses: u64,
    /// Fetches actually started.
    pub fetches: u64,
    /// Entries dropped to stay within capacity.
    pub evictions: u64,
    /// Fetches currently outstanding.
    pub in_flight: usize,
}

struct State {
    cache: LruCache<ChapterKey>,
    in_flight: HashMap<ChapterKey, broadcast::Sender<FetchResult>>,
    /// Bumped on every clear; fetches started before a clear do not fill
    /// the cache when they land.
    epoch: u64,
    hits: u64,
    misses: u64,
    fetches: u64,
    evictions: u64,
}

struct Inner {
    fetcher: Arc<dyn ChapterFetcher>,
    state: Mutex<State>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Shared chapter content cache with coalesced fetching.
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct ContentStore {
    inner: Arc<Inner>,
}

impl ContentStore {
    /// Creates a store holding at most `max_chapters` chapters.
    pub fn new(fetcher: Arc<dyn ChapterFetcher>, max_chapters: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                state: Mutex::new(State {
                    cache: LruCache::new(max_chapters),
                    in_flight: HashMap::new(),
                    epoch: 0,
                    hits: 0,
                    misses: 0,
                    fetches: 0,
                    evictions: 0,
                }),
            }),
        }
    }

    /// Returns the text of a chapter.
    ///
    /// Cached text is returned without touching the fetcher. Otherwise the
    /// caller joins the outstanding fetch for this chapter, or starts one.
    /// Failures are not cached, so the next call fetches again.
    pub async fn get(&self, chapter: &Chapter) -> FetchResult {
        let key = ChapterKey::of(chapter);

        let mut receiver = {
            let mut state = self.inner.state();

            if let Some(text) = state.cache.get(&key) {
                state.hits += 1;
                debug!(chapter = %chapter.chapter_id, "Content cache hit");
                return Ok(text);
            }
            state.misses += 1;

            if let Some(sender) = state.in_flight.get(&key) {
                debug!(chapter = %chapter.chapter_id, "Joining in-flight fetch");
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(1);
                state.in_flight.insert(key.clone(), sender);
                state.fetches += 1;
                let epoch = state.epoch;
                drop(state);

                tokio::spawn(run_fetch(self.inner.clone(), key, chapter.clone(), epoch));
                receiver
            }
        };

        receiver
            .recv()
            .await
            .map_err(|e| FetchError::Interrupted(e.to_string()))?
    }

    /// Returns true if the chapter's text is cached.
    pub fn contains(&self, chapter: &Chapter) -> bool {
        self.inner.state().cache.contains(&ChapterKey::of(chapter))
    }

    /// Starts background fetches for `count` chapters from `start`.
    ///
    /// The range is clipped to the catalog. Failures are logged and
    /// otherwise ignored. The returned handles may be awaited or dropped;
    /// dropping them does not stop the fetches.
    pub fn prefetch(
        &self,
        start: usize,
        count: usize,
        catalog: &ChapterCatalog,
    ) -> Vec<JoinHandle<()>> {
        let end = start.saturating_add(count).min(catalog.len());

        (start..end)
            .filter_map(|index| catalog.get(index).cloned())
            .map(|chapter| {
                let store = self.clone();
                tokio::spawn(async move {
                    if let Err(err) = store.get(&chapter).await {
                        warn!(
                            chapter = %chapter.chapter_id,
                            error = %err,
                            "Prefetch failed"
                        );
                    }
                })
            })
            .collect()
    }

    /// Drops every cached chapter.
    pub fn clear(&self) {
        let mut state = self.inner.state();
        state.cache.clear();
        state.epoch += 1;
        debug!("Content cache cleared");
    }

    /// Drops every cached chapter of one book.
    pub fn clear_book(&self, book_id: &str) {
        let mut state = self.inner.state();
        let removed = state.cache.remove_where(|key| key.book_id == book_id);
        state.epoch += 1;
        debug!(book_id, removed, "Content cache cleared for book");
    }

    /// Current cache counters.
    pub fn stats(&self) -> ContentStats {
        let state = self.inner.state();
        ContentStats {
            entries: state.cache.len(),
            capacity: state.cache.capacity(),
            bytes: state.cache.bytes(),
            hits: state.hits,
            misses: state.misses,
            fetches: state.fetches,
            evictions: state.evictions,
            in_flight: state.in_flight.len(),
        }
    }

    /// Name of the underlying content source.
    pub fn source_name(&self) -> &'static str {
        self.inner.fetcher.name()
    }
}

async fn run_fetch(inner: Arc<Inner>, key: ChapterKey, chapter: Chapter, epoch: u64) {
    let fetched = AssertUnwindSafe(inner.fetcher.fetch(&chapter))
        .catch_unwind()
        .await;

    let result: FetchResult = match fetched {
        Ok(Ok(text)) => Ok(Arc::from(text)),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(FetchError::Interrupted(format!(
            "fetch of '{}' panicked",
            chapter.chapter_id
        ))),
    };

    let mut state = inner.state();
    if let Ok(text) = &result {
        if state.epoch == epoch {
            let evicted = state.cache.insert(key.clone(), text.clone());
            if evicted > 0 {
                state.evictions += evicted as u64;
                debug!(evicted, "Evicted least recently used chapters");
            }
        }
    }

    if let Some(sender) = state.in_flight.remove(&key) {
        debug!(
            chapter = %chapter.chapter_id,
            waiting = sender.receiver_count(),
            success = result.is_ok(),
            "Completing fetch"
        );
        // Receivers may have gone away; the cache already holds the text.
        let _ = sender.send(result);
    }
}

/// Formats a byte count for display, e.g. `1.5 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Book;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Fetcher that counts calls, can be held open, and fails chosen chapters.
    struct CountingFetcher {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        failing: Mutex<HashSet<usize>>,
    }

    impl CountingFetcher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: None,
                failing: Mutex::new(HashSet::new()),
            })
        }

        fn gated(gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                gate: Some(gate),
                failing: Mutex::new(HashSet::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChapterFetcher for CountingFetcher {
        fn name(&self) -> &'static str {
            "Counting"
        }

        async fn fetch(&self, chapter: &Chapter) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.failing.lock().unwrap().contains(&chapter.index) {
                return Err(FetchError::Unavailable("offline".to_string()));
            }
            Ok(format!("T{}", chapter.index))
        }
    }

    fn catalog(book_id: &str, chapters: usize) -> ChapterCatalog {
        let mut book = Book::new("Water Margin", "Shi Nai'an", chapters);
        book.book_id = book_id.to_string();
        ChapterCatalog::generate(&book)
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetcher() {
        let fetcher = CountingFetcher::new();
        let store = ContentStore::new(fetcher.clone(), 16);
        let catalog = catalog("b", 3);
        let chapter = catalog.get(1).unwrap();

        assert_eq!(&*store.get(chapter).await.unwrap(), "T1");
        assert_eq!(&*store.get(chapter).await.unwrap(), "T1");

        assert_eq!(fetcher.calls(), 1);
        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(store.contains(chapter));
    }

    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let gate = Arc::new(Notify::new());
        let fetcher = CountingFetcher::gated(gate.clone());
        let store = ContentStore::new(fetcher.clone(), 16);
        let catalog = catalog("b", 3);
        let chapter = catalog.get(0).unwrap().clone();

        let waiters: Vec<_> = (0..5)
            .map(|_| {
                let store = store.clone();
                let chapter = chapter.clone();
                tokio::spawn(async move { store.get(&chapter).await })
            })
            .collect();

        // Let every waiter register before releasing the fetch.
        while store.stats().misses < 5 {
            tokio::task::yield_now().await;
        }
        gate.notify_one();

        for waiter in waiters {
            assert_eq!(&*waiter.await.unwrap().unwrap(), "T0");
        }
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(store.stats().fetches, 1);
        assert_eq!(store.stats().in_flight, 0);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let fetcher = CountingFetcher::new();
        fetcher.failing.lock().unwrap().insert(2);
        let store = ContentStore::new(fetcher.clone(), 16);
        let catalog = catalog("b", 3);
        let chapter = catalog.get(2).unwrap();

        assert!(matches!(
            store.get(chapter).await,
            Err(FetchError::Unavailable(_))
        ));
        assert!(!store.contains(chapter));

        fetcher.failing.lock().unwrap().clear();
        assert_eq!(&*store.get(chapter).await.unwrap(), "T2");
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_prefetch_clips_to_catalog() {
        let fetcher = CountingFetcher::new();
        let store = ContentStore::new(fetcher.clone(), 16);
        let catalog = catalog("b", 4);

        let handles = store.prefetch(2, 5, &catalog);
        assert_eq!(handles.len(), 2);
        futures::future::join_all(handles).await;

        assert!(store.contains(catalog.get(2).unwrap()));
        assert!(store.contains(catalog.get(3).unwrap()));
        assert_eq!(fetcher.calls(), 2);

        assert!(store.prefetch(4, 2, &catalog).is_empty());
    }

    #[tokio::test]
    async fn test_prefetch_swallows_failures() {
        let fetcher = CountingFetcher::new();
        fetcher.failing.lock().unwrap().insert(1);
        let store = ContentStore::new(fetcher.clone(), 16);
        let catalog = catalog("b", 3);

        for handle in store.prefetch(1, 2, &catalog) {
            assert!(handle.await.is_ok());
        }
        assert!(!store.contains(catalog.get(1).unwrap()));
        assert!(store.contains(catalog.get(2).unwrap()));
    }

    #[tokio::test]
    async fn test_clear_book_only_drops_that_book() {
        let store = ContentStore::new(CountingFetcher::new(), 16);
        let first = catalog("first", 2);
        let second = catalog("second", 2);

        for chapter in first.iter().chain(second.iter()) {
            store.get(chapter).await.unwrap();
        }
        store.clear_book("first");

        assert!(first.iter().all(|c| !store.contains(c)));
        assert!(second.iter().all(|c| store.contains(c)));

        store.clear();
        assert_eq!(store.stats().entries, 0);
        assert_eq!(store.stats().bytes, 0);
    }

    #[tokio::test]
    async fn test_lru_bound() {
        let store = ContentStore::new(CountingFetcher::new(), 2);
        let catalog = catalog("b", 3);

        for chapter in catalog.iter() {
            store.get(chapter).await.unwrap();
        }

        let stats = store.stats();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.evictions, 1);
        assert!(!store.contains(catalog.get(0).unwrap()));
    }

    #[tokio::test]
    async fn test_fetch_landing_after_clear_is_not_cached() {
        let gate = Arc::new(Notify::new());
        let store = ContentStore::new(CountingFetcher::gated(gate.clone()), 16);
        let catalog = catalog("b", 1);
        let chapter = catalog.get(0).unwrap().clone();

        let pending = {
            let store = store.clone();
            let chapter = chapter.clone();
            tokio::spawn(async move { store.get(&chapter).await })
        };
        while store.stats().in_flight == 0 {
            tokio::task::yield_now().await;
        }

        store.clear();
        gate.notify_one();

        assert_eq!(&*pending.await.unwrap().unwrap(), "T0");
        assert!(!store.contains(&chapter));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }
}
