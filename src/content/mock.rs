//! Mock chapter source that generates placeholder text.
//!
//! Stands in for a real book source: waits for a configured latency and
//! returns a few paragraphs that mention the chapter being read.

use super::ChapterFetcher;
use crate::config::SourceConfig;
use crate::error::FetchError;
use crate::models::Chapter;
use async_trait::async_trait;
use std::time::Duration;

const PARAGRAPHS: &[&str] = &[
    "In a real reader this text would come from a book source or from local storage. This sample build generates it so that the reading flow can be exercised end to end.",
    "Tap the middle of the screen to open the menu, where the font size, theme and spacing can be adjusted.",
    "The reader supports the following:",
    "- Automatic saving of reading progress",
    "- Several font sizes",
    "- Four reading themes: white, sepia, green and night",
    "- Adjustable line and paragraph spacing",
    "- Quick chapter switching",
    "Use the buttons at the bottom to move to the previous or next chapter. Your position is saved as you go, and the next time the book is opened reading resumes where it stopped.",
    "Upcoming chapters are fetched in the background while you read, so turning to the next chapter is usually instant.",
];

/// Chapter source producing generated text after a fixed delay.
#[derive(Debug, Clone)]
pub struct MockChapterSource {
    latency: Duration,
}

impl MockChapterSource {
    /// Creates a source using the configured chapter latency.
    pub fn new(config: &SourceConfig) -> Self {
        Self::with_latency(Duration::from_millis(config.chapter_latency_ms))
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }
}

#[async_trait]
impl ChapterFetcher for MockChapterSource {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn fetch(&self, chapter: &Chapter) -> Result<String, FetchError> {
        if chapter.book_id.is_empty() {
            return Err(FetchError::NotFound(chapter.chapter_id.clone()));
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        Ok(generate_text(chapter))
    }
}

fn generate_text(chapter: &Chapter) -> String {
    let opening = format!("This is the content of chapter {}.", chapter.index + 1);

    let mut text = chapter.display_name();
    text.push_str("\n\n");
    text.push_str(&opening);
    for paragraph in PARAGRAPHS {
        text.push_str("\n\n");
        text.push_str(paragraph);
    }
    text
}
