pub mod favicon;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{Entry, FaviconCacheEntry, Feed, UrlHistory};

pub use favicon::SqliteFaviconStore;
pub use sqlite::SqliteStore;

pub trait Store {
    // Feed operations
    fn add_feed(&self, feed: &Feed) -> Result<i64>;
    fn get_feed(&self, id: i64) -> Result<Option<Feed>>;
    fn get_feed_by_url(&self, url: &str) -> Result<Option<Feed>>;
    fn get_all_feeds(&self) -> Result<Vec<Feed>>;
    fn get_active_feeds(&self) -> Result<Vec<Feed>>;
    /// Replace the stored record for `feed.id` (insert when the id is 0).
    fn upsert_feed(&self, feed: &Feed) -> Result<Feed>;
    fn delete_feed(&self, id: i64) -> Result<()>;

    // Entry operations
    fn entry_exists_by_url(&self, url: &str) -> Result<bool>;
    /// Insert a new entry. Fails with `TributaryError::EntryExists` when any
    /// of its URLs is already stored.
    fn create_entry(&self, entry: &Entry) -> Result<Entry>;
    fn get_entry(&self, id: &str) -> Result<Option<Entry>>;
    fn get_entries_by_feed(&self, feed_id: i64) -> Result<Vec<Entry>>;
    fn count_entries(&self) -> Result<i64>;

    fn entry_exists_by_any_url(&self, urls: &UrlHistory) -> Result<bool> {
        for url in urls.iter() {
            if self.entry_exists_by_url(url)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Storage owned by the favicon cache, independent of feeds and entries.
pub trait FaviconStore {
    fn favicon_get(&self, page_url: &str) -> Result<Option<FaviconCacheEntry>>;
    /// Upsert the full record for `entry.page_url`.
    fn favicon_put(&self, entry: &FaviconCacheEntry) -> Result<()>;
    fn favicon_delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
    fn favicon_clear(&self) -> Result<usize>;
}

pub(crate) fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| s.parse::<DateTime<Utc>>().ok())
}
