//! Reading statistics.
//!
//! Tracks time spent reading per day, words read per day, which chapters
//! of which books have been read, and a short list of recent reading
//! records. Everything is persisted as one JSON record.

use crate::error::StorageError;
use crate::storage::{PreferenceStore, read_json, write_guard, write_json};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Preference key holding the statistics record.
const STATS_KEY: &str = "shiori.reading_stats";

/// Number of recent reading records kept.
pub const RECENT_LIMIT: usize = 20;

/// One chapter opened by the reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRecord {
    pub book_id: String,
    pub book_title: String,
    pub chapter_name: String,
    pub chapter_index: usize,
    pub read_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DailyTotals {
    date: NaiveDate,
    seconds: u64,
    words: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct StatsRecord {
    /// Sorted by date, one entry per day with activity.
    days: Vec<DailyTotals>,
    /// Newest first, at most `RECENT_LIMIT`.
    recent: Vec<ReadingRecord>,
    chapters_read: BTreeMap<String, BTreeSet<usize>>,
}

impl StatsRecord {
    fn day_mut(&mut self, date: NaiveDate) -> &mut DailyTotals {
        let pos = match self.days.binary_search_by(|d| d.date.cmp(&date)) {
            Ok(pos) => pos,
            Err(pos) => {
                self.days.insert(
                    pos,
                    DailyTotals {
                        date,
                        seconds: 0,
                        words: 0,
                    },
                );
                pos
            }
        };
        &mut self.days[pos]
    }

    fn seconds_since(&self, first_day: NaiveDate) -> u64 {
        self.days
            .iter()
            .filter(|d| d.date >= first_day)
            .map(|d| d.seconds)
            .sum()
    }
}

#[derive(Debug, Clone)]
struct ActiveSession {
    book_id: String,
    started_at: DateTime<Utc>,
}

/// Persistent reading statistics.
///
/// A reading session is timed between [`start_session`](Self::start_session)
/// and [`end_session`](Self::end_session); the open session itself lives
/// only in memory.
pub struct ReadingStatsStore {
    prefs: Arc<dyn PreferenceStore>,
    write_lock: Mutex<()>,
    active: Mutex<Option<ActiveSession>>,
}

impl ReadingStatsStore {
    pub fn new(prefs: Arc<dyn PreferenceStore>) -> Self {
        Self {
            prefs,
            write_lock: Mutex::new(()),
            active: Mutex::new(None),
        }
    }

    /// Starts timing a reading session, replacing any open one.
    pub fn start_session(&self, book_id: &str) {
        self.start_session_at(book_id, Utc::now());
    }

    /// Ends the open session and adds its duration to today's total.
    ///
    /// Returns the session length, or `None` if no session was open.
    pub fn end_session(&self) -> Result<Option<Duration>, StorageError> {
        self.end_session_at(Utc::now())
    }

    /// Records that a chapter was opened.
    pub fn add_record(
        &self,
        book_id: &str,
        book_title: &str,
        chapter_name: &str,
        chapter_index: usize,
    ) -> Result<(), StorageError> {
        let record = ReadingRecord {
            book_id: book_id.to_string(),
            book_title: book_title.to_string(),
            chapter_name: chapter_name.to_string(),
            chapter_index,
            read_time: Utc::now(),
        };

        self.modify(|stats| {
            stats
                .chapters_read
                .entry(record.book_id.clone())
                .or_default()
                .insert(record.chapter_index);
            stats.recent.retain(|r| {
                r.book_id != record.book_id || r.chapter_index != record.chapter_index
            });
            stats.recent.insert(0, record);
            stats.recent.truncate(RECENT_LIMIT);
        })
    }

    /// Adds to today's count of words read.
    pub fn add_words(&self, words: u64) -> Result<(), StorageError> {
        let today = Utc::now().date_naive();
        self.modify(|stats| stats.day_mut(today).words += words)
    }

    pub fn today_duration(&self) -> Result<Duration, StorageError> {
        let today = Utc::now().date_naive();
        Ok(seconds(self.load()?.seconds_since(today)))
    }

    /// Time read since Monday of the current week.
    pub fn week_duration(&self) -> Result<Duration, StorageError> {
        let today = Utc::now().date_naive();
        let monday = today - Duration::days(today.weekday().num_days_from_monday() as i64);
        Ok(seconds(self.load()?.seconds_since(monday)))
    }

    pub fn total_duration(&self) -> Result<Duration, StorageError> {
        Ok(seconds(self.load()?.seconds_since(NaiveDate::MIN)))
    }

    pub fn today_words(&self) -> Result<u64, StorageError> {
        let today = Utc::now().date_naive();
        let stats = self.load()?;
        Ok(stats
            .days
            .iter()
            .find(|d| d.date == today)
            .map_or(0, |d| d.words))
    }

    /// Most recent reading records, newest first.
    pub fn recent_records(&self) -> Result<Vec<ReadingRecord>, StorageError> {
        Ok(self.load()?.recent)
    }

    /// Number of distinct books with at least one chapter read.
    pub fn books_read(&self) -> Result<usize, StorageError> {
        Ok(self.load()?.chapters_read.len())
    }

    /// Number of distinct chapters read across all books.
    pub fn chapters_read(&self) -> Result<usize, StorageError> {
        Ok(self.load()?.chapters_read.values().map(BTreeSet::len).sum())
    }

    /// Forgets every statistic, including an open session.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        *self.active_session() = None;
        let _guard = write_guard(&self.write_lock);
        self.prefs.remove(STATS_KEY)
    }

    fn start_session_at(&self, book_id: &str, at: DateTime<Utc>) {
        *self.active_session() = Some(ActiveSession {
            book_id: book_id.to_string(),
            started_at: at,
        });
    }

    fn end_session_at(&self, at: DateTime<Utc>) -> Result<Option<Duration>, StorageError> {
        let Some(session) = self.active_session().take() else {
            return Ok(None);
        };

        let elapsed = (at - session.started_at).max(Duration::zero());
        let secs = elapsed.num_seconds() as u64;
        self.modify(|stats| stats.day_mut(at.date_naive()).seconds += secs)?;
        debug!(book_id = %session.book_id, secs, "Reading session ended");
        Ok(Some(elapsed))
    }

    fn active_session(&self) -> std::sync::MutexGuard<'_, Option<ActiveSession>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn modify(&self, change: impl FnOnce(&mut StatsRecord)) -> Result<(), StorageError> {
        let _guard = write_guard(&self.write_lock);
        let mut stats = self.load()?;
        change(&mut stats);
        write_json(self.prefs.as_ref(), STATS_KEY, &stats)
    }

    fn load(&self) -> Result<StatsRecord, StorageError> {
        Ok(read_json(self.prefs.as_ref(), STATS_KEY)?.unwrap_or_default())
    }
}

fn seconds(secs: u64) -> Duration {
    Duration::seconds(secs as i64)
}
