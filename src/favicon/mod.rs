//! Favicon cache.
//!
//! Maps page URLs to site icon URLs. A lookup walks a chain of fallbacks
//! and stops at the first one that produces an icon:
//!
//! ```text
//! exact cache hit → document <link> icons → origin cache hit
//!     → downloaded page <link> icons → {origin}/favicon.ico → failure record
//! ```
//!
//! Failures are recorded against the site origin. Once a site has failed
//! `max_failure_count` times, lookups for it return nothing without touching
//! the network until the record is compacted away.

mod config;

pub use config::FaviconConfig;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use url::Url;

use crate::app::Result;
use crate::document::Document;
use crate::domain::{FaviconCacheEntry, Feed};
use crate::fetcher::classify::is_http_url;
use crate::fetcher::Fetcher;
use crate::store::{FaviconStore, Store};

const REFRESH_CONCURRENCY: usize = 8;

pub struct FaviconCache {
    store: Arc<dyn FaviconStore + Send + Sync>,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    config: FaviconConfig,
}

impl FaviconCache {
    pub fn new(
        store: Arc<dyn FaviconStore + Send + Sync>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        config: FaviconConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            config,
        }
    }

    pub fn config(&self) -> &FaviconConfig {
        &self.config
    }

    /// Find the icon for the page at `url`.
    ///
    /// `document` is the page itself when the caller already downloaded it;
    /// it saves a fetch. Network failures are never errors here, only store
    /// failures are.
    pub async fn lookup(&self, url: &Url, document: Option<&Document>) -> Result<Option<String>> {
        if !is_http_url(url) {
            return Ok(None);
        }

        let now = Utc::now();
        let max_age = self.config.max_age();
        let mut urls = vec![url.to_string()];

        let exact = self.store.favicon_get(url.as_str())?;
        if let Some(entry) = &exact {
            if let Some(icon) = entry.fresh_icon(max_age, now) {
                return Ok(Some(icon.to_string()));
            }
            if entry.failure_count >= self.config.max_failure_count {
                debug!(url = %url, failures = entry.failure_count, "Favicon lookup backed off");
                return Ok(None);
            }
        }

        if let Some(document) = document {
            if let Some(icon) = self.search_document(document, url).await {
                self.cache_all(&urls, &icon, now)?;
                return Ok(Some(icon));
            }
        }

        let Some(origin) = origin_url(url) else {
            return Ok(None);
        };
        let origin_entry = if origin == *url {
            exact
        } else {
            self.store.favicon_get(origin.as_str())?
        };
        if let Some(entry) = &origin_entry {
            if let Some(icon) = entry.fresh_icon(max_age, now) {
                return Ok(Some(icon.to_string()));
            }
            if entry.failure_count >= self.config.max_failure_count {
                debug!(origin = %origin, failures = entry.failure_count, "Favicon lookup backed off");
                return Ok(None);
            }
        }

        if document.is_none() {
            match self
                .fetcher
                .fetch_html(url.as_str(), self.config.fetch_html_timeout())
                .await
            {
                Ok(page) => {
                    let page_url = Url::parse(&page.response_url).unwrap_or_else(|_| url.clone());
                    if page_url != *url {
                        urls.push(page_url.to_string());
                    }
                    let fetched = Document::parse(page.body);
                    if let Some(icon) = self.search_document(&fetched, &page_url).await {
                        self.cache_all(&urls, &icon, now)?;
                        return Ok(Some(icon));
                    }
                }
                Err(e) => debug!(url = %url, error = %e, "Favicon page fetch failed"),
            }
        }

        if let Ok(fallback) = origin.join("/favicon.ico") {
            if self.verify_image(&fallback).await {
                if !urls.iter().any(|u| u == origin.as_str()) {
                    urls.push(origin.to_string());
                }
                let icon = fallback.to_string();
                self.cache_all(&urls, &icon, now)?;
                return Ok(Some(icon));
            }
        }

        self.record_failure(&origin, origin_entry.as_ref(), now)?;
        Ok(None)
    }

    /// Delete records older than the max age. Returns how many were removed.
    pub fn compact(&self) -> Result<usize> {
        let Some(cutoff) = Utc::now().checked_sub_signed(self.config.max_age()) else {
            debug!("Favicon max age predates any record, nothing to compact");
            return Ok(0);
        };
        let deleted = self.store.favicon_delete_older_than(cutoff)?;
        info!("Compacted favicon cache: {} expired records removed", deleted);
        Ok(deleted)
    }

    pub fn clear(&self) -> Result<usize> {
        self.store.favicon_clear()
    }

    /// First declared icon in `document` that verifies as an image.
    async fn search_document(&self, document: &Document, page_url: &Url) -> Option<String> {
        let base = document.base_url(page_url);
        for candidate in document.icon_candidates(&base) {
            if self.verify_image(&candidate).await {
                return Some(candidate.to_string());
            }
        }
        None
    }

    async fn verify_image(&self, url: &Url) -> bool {
        match self
            .fetcher
            .probe_image(url.as_str(), self.config.fetch_image_timeout())
            .await
        {
            Ok(probe) => {
                probe.is_plausible_image(self.config.min_image_size, self.config.max_image_size)
            }
            Err(e) => {
                debug!(url = %url, error = %e, "Icon probe failed");
                false
            }
        }
    }

    /// Point every URL of this lookup at `icon`. Each write is its own upsert.
    fn cache_all(&self, urls: &[String], icon: &str, now: DateTime<Utc>) -> Result<()> {
        for url in urls {
            self.store
                .favicon_put(&FaviconCacheEntry::found(url.as_str(), icon, now))?;
        }
        Ok(())
    }

    fn record_failure(
        &self,
        origin: &Url,
        prior: Option<&FaviconCacheEntry>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let max = self.config.max_failure_count;
        let failure_count = match prior {
            Some(entry) if entry.failure_count < max => entry.failure_count + 1,
            Some(_) => max,
            None => 1,
        };
        debug!(origin = %origin, failure_count, "Favicon lookup failed");
        self.store
            .favicon_put(&FaviconCacheEntry::failed(origin.as_str(), failure_count, now))
    }
}

/// `scheme://host[:port]/` of an http(s) URL.
pub fn origin_url(url: &Url) -> Option<Url> {
    let origin = url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Url::parse(&format!("{}/", origin.ascii_serialization())).ok()
}

/// Look up the icon of every active feed and persist the ones that changed.
///
/// Returns the number of feeds updated.
pub async fn refresh_feed_icons<S: Store>(cache: &FaviconCache, store: &S) -> Result<usize> {
    let pages: Vec<(Feed, Url)> = store
        .get_active_feeds()?
        .into_iter()
        .filter_map(|feed| {
            let page = feed
                .link
                .as_deref()
                .or(feed.current_url())
                .and_then(|u| Url::parse(u).ok())?;
            Some((feed, page))
        })
        .collect();

    let lookups: Vec<(Feed, Result<Option<String>>)> = stream::iter(pages)
        .map(|(feed, page)| async move {
            let icon = cache.lookup(&page, None).await;
            (feed, icon)
        })
        .buffer_unordered(REFRESH_CONCURRENCY)
        .collect()
        .await;

    let mut updated = 0;
    for (mut feed, icon) in lookups {
        let icon = match icon {
            Ok(icon) => icon,
            Err(e) => {
                warn!(feed_id = feed.id, "Favicon lookup failed: {}", e);
                continue;
            }
        };
        if icon.is_some() && icon != feed.favicon_url {
            debug!(feed_id = feed.id, icon = ?icon, "Feed icon changed");
            feed.favicon_url = icon;
            feed.date_updated = Some(Utc::now());
            match store.upsert_feed(&feed) {
                Ok(_) => updated += 1,
                Err(e) => warn!(feed_id = feed.id, "Failed to store feed icon: {}", e),
            }
        }
    }

    Ok(updated)
}
