use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One cached favicon lookup result, keyed by page (or origin) URL.
///
/// Records are always written whole; there is no partial update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaviconCacheEntry {
    pub page_url: String,
    /// `None` records that the page is known to have no icon.
    pub icon_url: Option<String>,
    pub date_updated: DateTime<Utc>,
    pub failure_count: u32,
}

impl FaviconCacheEntry {
    pub fn found(page_url: impl Into<String>, icon_url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            page_url: page_url.into(),
            icon_url: Some(icon_url.into()),
            date_updated: now,
            failure_count: 0,
        }
    }

    pub fn failed(page_url: impl Into<String>, failure_count: u32, now: DateTime<Utc>) -> Self {
        Self {
            page_url: page_url.into(),
            icon_url: None,
            date_updated: now,
            failure_count,
        }
    }

    pub fn is_expired(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(self.date_updated) > max_age
    }

    /// The icon URL, unless the record is too old to trust.
    pub fn fresh_icon(&self, max_age: Duration, now: DateTime<Utc>) -> Option<&str> {
        if self.is_expired(max_age, now) {
            return None;
        }
        self.icon_url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_icon_respects_max_age() {
        let now = Utc::now();
        let entry = FaviconCacheEntry::found(
            "https://a.example/",
            "https://a.example/favicon.ico",
            now - Duration::days(31),
        );
        assert!(entry.is_expired(Duration::days(30), now));
        assert_eq!(entry.fresh_icon(Duration::days(30), now), None);
        assert_eq!(
            entry.fresh_icon(Duration::days(60), now),
            Some("https://a.example/favicon.ico")
        );
    }

    #[test]
    fn test_failed_entry_has_no_icon() {
        let entry = FaviconCacheEntry::failed("https://a.example/", 2, Utc::now());
        assert_eq!(entry.icon_url, None);
        assert_eq!(entry.failure_count, 2);
        assert_eq!(entry.fresh_icon(Duration::days(30), Utc::now()), None);
    }
}
