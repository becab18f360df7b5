use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the favicon cache
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaviconConfig {
    /// Cached records older than this many days are ignored (default: 30)
    pub max_age_days: i64,

    /// Failed lookups per site before giving up on it (default: 2)
    pub max_failure_count: u32,

    /// Timeout for downloading a page to search for icon links (default: 2000)
    pub fetch_html_timeout_ms: u64,

    /// Timeout for the HEAD request verifying an icon (default: 1000)
    pub fetch_image_timeout_ms: u64,

    /// Smallest accepted icon in bytes (default: 50)
    pub min_image_size: u64,

    /// Largest accepted icon in bytes (default: 10240)
    pub max_image_size: u64,
}

impl Default for FaviconConfig {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            max_failure_count: 2,
            fetch_html_timeout_ms: 2000,
            fetch_image_timeout_ms: 1000,
            min_image_size: 50,
            max_image_size: 10240,
        }
    }
}

impl FaviconConfig {
    /// Negative ages count as zero; ages chrono cannot represent saturate.
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.max_age_days.max(0)).unwrap_or(chrono::Duration::MAX)
    }

    pub fn fetch_html_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_html_timeout_ms)
    }

    pub fn fetch_image_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_image_timeout_ms)
    }
}
