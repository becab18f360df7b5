use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::UrlHistory;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    pub feed_id: i64,
    pub urls: UrlHistory,
    pub title: Option<String>,
    pub author: Option<String>,
    pub content: Option<String>,
    pub feed_title: Option<String>,
    pub favicon_url: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
    pub date_created: DateTime<Utc>,
}

impl Entry {
    pub fn new(feed_id: i64, url: String) -> Self {
        let id = Self::generate_id(&url);
        Self {
            id,
            feed_id,
            urls: UrlHistory::from_url(url),
            title: None,
            author: None,
            content: None,
            feed_title: None,
            favicon_url: None,
            date_published: None,
            date_created: Utc::now(),
        }
    }

    /// Content-addressed id derived from the entry's original URL.
    pub fn generate_id(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn current_url(&self) -> Option<&str> {
        self.urls.current()
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(Untitled)")
    }
}
