//! Mock book search.
//!
//! Answers searches from a fixed list of titles after a simulated delay,
//! standing in for a remote book source.

use crate::config::SourceConfig;
use crate::models::{Book, BookKind};
use std::time::Duration;

/// Maximum number of results returned by one search.
const MAX_RESULTS: usize = 10;

/// Titles known to the mock source, with their authors.
const CATALOG: &[(&str, &str)] = &[
    ("The Three-Body Problem", "Liu Cixin"),
    ("The Wandering Earth", "Liu Cixin"),
    ("Ball Lightning", "Liu Cixin"),
    ("To Live", "Yu Hua"),
    ("Chronicle of a Blood Merchant", "Yu Hua"),
    ("Brothers", "Yu Hua"),
    ("Ordinary World", "Lu Yao"),
    ("Life", "Lu Yao"),
    ("White Deer Plain", "Chen Zhongshi"),
    ("Dream of the Red Chamber", "Cao Xueqin"),
    ("Journey to the West", "Wu Cheng'en"),
    ("Water Margin", "Shi Nai'an"),
];

/// Search service returning canned results.
#[derive(Debug, Clone)]
pub struct BookSearch {
    latency: Duration,
}

impl BookSearch {
    pub fn new(config: &SourceConfig) -> Self {
        Self::with_latency(Duration::from_millis(config.search_latency_ms))
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    /// Finds books whose title contains `keyword` (case-insensitive).
    ///
    /// An empty keyword matches everything. At most ten results.
    pub async fn search(&self, keyword: &str) -> Vec<Book> {
        self.simulate_latency().await;

        let needle = keyword.trim().to_lowercase();
        CATALOG
            .iter()
            .filter(|(title, _)| needle.is_empty() || title.to_lowercase().contains(&needle))
            .take(MAX_RESULTS)
            .map(|(title, author)| {
                let mut book = Book::new(*title, *author, chapter_count(title));
                book.intro = Some(format!("An introduction to {}.", title));
                book.kind = BookKind::Network;
                book
            })
            .collect()
    }

    /// Returns details for a book id. The mock source knows every id.
    pub async fn book_detail(&self, book_id: &str) -> Book {
        self.simulate_latency().await;

        let mut book = Book::new("Book details", "Unknown author", 100);
        book.book_id = book_id.to_string();
        book
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

/// Deterministic chapter count in `20..=200` derived from the title.
fn chapter_count(title: &str) -> usize {
    let hash = title
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    20 + hash % 181
}
