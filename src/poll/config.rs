use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for poll runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Feeds fetched less than this many seconds ago are skipped (default: 300)
    pub recency_period_secs: u64,

    /// Content failures tolerated before a feed is deactivated (default: 10)
    pub deactivation_threshold: u32,

    /// Timeout for downloading a feed document (default: 10)
    pub feed_fetch_timeout_secs: u64,

    /// Timeout for downloading an article page (default: 5)
    pub entry_fetch_timeout_secs: u64,

    /// Feeds processed at the same time (default: 10)
    pub max_concurrent_feeds: usize,

    /// Entries of one feed processed at the same time (default: 8)
    pub max_concurrent_entries: usize,

    /// Download article pages instead of relying on feed content (default: true)
    pub fetch_full_text: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            recency_period_secs: 300,
            deactivation_threshold: 10,
            feed_fetch_timeout_secs: 10,
            entry_fetch_timeout_secs: 5,
            max_concurrent_feeds: 10,
            max_concurrent_entries: 8,
            fetch_full_text: true,
        }
    }
}

impl PollConfig {
    /// Saturates at `TimeDelta::MAX` for periods chrono cannot represent.
    pub fn recency_period(&self) -> chrono::Duration {
        i64::try_from(self.recency_period_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    pub fn feed_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_fetch_timeout_secs)
    }

    pub fn entry_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.entry_fetch_timeout_secs)
    }
}
