use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::UrlHistory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub urls: UrlHistory,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub active: bool,
    pub favicon_url: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub date_fetched: Option<DateTime<Utc>>,
    pub date_last_modified: Option<DateTime<Utc>>,
    /// Consecutive content failures; `None` means zero.
    pub error_count: Option<u32>,
    pub deactivation_reason: Option<String>,
    pub deactivation_date: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
    pub date_updated: Option<DateTime<Utc>>,
}

impl Feed {
    pub fn new(url: String) -> Self {
        Self {
            id: 0,
            urls: UrlHistory::from_url(url),
            title: None,
            description: None,
            link: None,
            active: true,
            favicon_url: None,
            date_published: None,
            date_fetched: None,
            date_last_modified: None,
            error_count: None,
            deactivation_reason: None,
            deactivation_date: None,
            date_created: Utc::now(),
            date_updated: None,
        }
    }

    /// The URL the feed is fetched from: the last one in its history.
    pub fn current_url(&self) -> Option<&str> {
        self.urls.current()
    }

    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.current_url())
            .unwrap_or("(Untitled)")
    }

    /// Whether the feed was fetched less than `period` ago.
    pub fn fetched_within(&self, period: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.date_fetched
            .is_some_and(|fetched| now.signed_duration_since(fetched) < period)
    }

    /// Reward a successful fetch by moving the error count toward zero.
    ///
    /// Returns whether the count changed.
    pub fn record_success(&mut self) -> bool {
        match self.error_count {
            Some(count) if count > 1 => {
                self.error_count = Some(count - 1);
                true
            }
            Some(_) => {
                self.error_count = None;
                true
            }
            None => false,
        }
    }

    /// Count a content failure, deactivating the feed once the count exceeds
    /// `threshold`. Returns whether this call deactivated the feed.
    pub fn record_failure(&mut self, threshold: u32, reason: &str, now: DateTime<Utc>) -> bool {
        let count = self.error_count.unwrap_or(0).saturating_add(1);
        self.error_count = Some(count);
        self.date_updated = Some(now);

        if self.active && count > threshold {
            self.active = false;
            self.deactivation_reason = Some(reason.to_string());
            self.deactivation_date = Some(now);
            return true;
        }
        false
    }

    /// Re-enable a deactivated feed and forget its failure history.
    pub fn activate(&mut self) {
        self.active = true;
        self.error_count = None;
        self.deactivation_reason = None;
        self.deactivation_date = None;
    }

    /// Fold freshly fetched remote data into this (stored) feed.
    ///
    /// Remote scalar fields win when present. URLs are appended in remote
    /// order, skipping ones already known, so identity is never lost.
    pub fn merge(&mut self, remote: RemoteFeed) {
        if remote.title.is_some() {
            self.title = remote.title;
        }
        if remote.description.is_some() {
            self.description = remote.description;
        }
        if remote.link.is_some() {
            self.link = remote.link;
        }
        if remote.date_published.is_some() {
            self.date_published = remote.date_published;
        }
        if remote.date_last_modified.is_some() {
            self.date_last_modified = remote.date_last_modified;
        }
        self.urls.merge(&remote.urls);
        self.date_fetched = Some(remote.date_fetched);
        self.date_updated = Some(remote.date_fetched);
        self.record_success();
    }
}

/// Feed fields as seen in a freshly fetched document.
#[derive(Debug, Clone)]
pub struct RemoteFeed {
    pub urls: UrlHistory,
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub date_last_modified: Option<DateTime<Utc>>,
    pub date_fetched: DateTime<Utc>,
}
