//! Entry acquisition: turns parsed feed items into stored entries.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};
use url::Url;

use crate::app::{Result, TributaryError};
use crate::document::Document;
use crate::domain::{Entry, Feed, UrlHistory};
use crate::fetcher::classify::{inaccessible_reason, is_binary_url, is_http_url};
use crate::fetcher::HtmlPage;
use crate::normalizer::ParsedEntry;
use crate::poll::PollContext;
use crate::rewrite::rewrite_url;
use crate::store::Store;

/// Store every new entry of `parsed`. Returns how many were created.
///
/// Each entry runs in its own task; a failure or panic costs only that entry.
pub(crate) async fn acquire_entries<S: Store + Send + Sync + 'static>(
    ctx: &Arc<PollContext<S>>,
    feed: &Feed,
    parsed: Vec<ParsedEntry>,
) -> usize {
    let entries = coerce_batch(feed, parsed);
    if entries.is_empty() {
        return 0;
    }

    let semaphore = Arc::new(Semaphore::new(ctx.config.max_concurrent_entries.max(1)));
    let mut tasks = JoinSet::new();

    for entry in entries {
        let ctx = ctx.clone();
        let semaphore = semaphore.clone();
        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return Ok(false);
            };
            let url = entry.current_url().unwrap_or_default().to_string();
            acquire_entry(&ctx, entry).await.map_err(|e| (url, e))
        });
    }

    let mut added = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(true)) => added += 1,
            Ok(Ok(false)) => {}
            Ok(Err((url, e @ TributaryError::Invariant(_)))) => {
                error!(feed_id = feed.id, url = %url, "Entry failed: {}", e);
            }
            Ok(Err((url, e))) => {
                warn!(feed_id = feed.id, url = %url, "Entry failed: {}", e);
            }
            Err(e) => {
                error!(feed_id = feed.id, "Entry task join error: {}", e);
            }
        }
    }

    added
}

/// Coerce parser output into entries: resolve links, drop items without a
/// usable URL, collapse duplicates (first wins) and copy feed properties.
pub(crate) fn coerce_batch(feed: &Feed, parsed: Vec<ParsedEntry>) -> Vec<Entry> {
    let base = feed
        .link
        .as_deref()
        .or(feed.current_url())
        .and_then(|u| Url::parse(u).ok());

    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for item in parsed {
        let Some(url) = item
            .link
            .as_deref()
            .and_then(|link| resolve_link(link, base.as_ref()))
        else {
            debug!(feed_id = feed.id, title = ?item.title, "Dropping entry without a usable URL");
            continue;
        };
        if !seen.insert(url.to_string()) {
            continue;
        }

        let mut entry = Entry::new(feed.id, url.to_string());
        entry.title = item.title;
        entry.author = item.author;
        entry.content = item.content;
        entry.date_published = item.date_published.or(feed.date_published);
        entry.feed_title = feed.title.clone();
        entry.favicon_url = feed.favicon_url.clone();
        entries.push(entry);
    }

    entries
}

fn resolve_link(link: &str, base: Option<&Url>) -> Option<Url> {
    let link = link.trim();
    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(link).ok()?,
        Err(_) => return None,
    };
    is_http_url(&url).then_some(url)
}

/// Run one entry through rewriting, the existence checks, the full text
/// download, favicon resolution and filtering, then store it.
///
/// Returns `false` when the entry turned out to be known already.
async fn acquire_entry<S: Store>(ctx: &PollContext<S>, mut entry: Entry) -> Result<bool> {
    let Some(url) = entry.current_url().and_then(|u| Url::parse(u).ok()) else {
        return Err(TributaryError::Invariant(format!(
            "entry {} has no valid URL",
            entry.id
        )));
    };

    if let Some(rewritten) = rewrite_url(&url, &ctx.rules) {
        entry.urls.append(rewritten.to_string());
    }

    if ctx.store.entry_exists_by_any_url(&entry.urls)? {
        debug!(url = %url, "Entry already stored");
        return Ok(false);
    }

    let page_url = current_url(&entry.urls).unwrap_or(url);
    let (document, base, fetched) = match fetch_page(ctx, &page_url).await {
        Some(page) => {
            let response_url = Url::parse(&page.response_url).unwrap_or_else(|_| page_url.clone());
            if response_url != page_url {
                let mut added = entry.urls.append(response_url.to_string());
                if let Some(rewritten) = rewrite_url(&response_url, &ctx.rules) {
                    added |= entry.urls.append(rewritten.to_string());
                }
                if added && ctx.store.entry_exists_by_any_url(&entry.urls)? {
                    debug!(url = %response_url, "Redirect target already stored");
                    return Ok(false);
                }
            }
            (Document::parse(page.body), response_url, true)
        }
        None => {
            let document = entry
                .content
                .as_deref()
                .map(Document::parse)
                .unwrap_or_else(Document::placeholder);
            (document, page_url.clone(), false)
        }
    };

    if entry.title.is_none() {
        entry.title = document.title();
    }

    let icon_page = current_url(&entry.urls).unwrap_or_else(|| base.clone());
    match ctx
        .favicons
        .lookup(&icon_page, fetched.then_some(&document))
        .await
    {
        Ok(Some(icon)) => entry.favicon_url = Some(icon),
        Ok(None) => {}
        Err(e) => warn!(url = %icon_page, "Favicon lookup failed: {}", e),
    }

    let base = document.base_url(&base);
    entry.content = Some(ctx.filter.sanitize(&document, &base, &ctx.sanitize));

    match ctx.store.create_entry(&entry) {
        Ok(created) => {
            debug!(entry_id = %created.id, "Created {}", created.display_title());
            Ok(true)
        }
        Err(TributaryError::EntryExists(url)) => {
            debug!(url = %url, "Entry stored concurrently");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Download the article page, unless fetching is disabled or the URL is
/// known not to yield readable HTML.
async fn fetch_page<S: Store>(ctx: &PollContext<S>, url: &Url) -> Option<HtmlPage> {
    if !ctx.config.fetch_full_text || !is_http_url(url) {
        return None;
    }
    if is_binary_url(url) {
        debug!(url = %url, "Skipping full text of binary URL");
        return None;
    }
    if let Some(reason) = inaccessible_reason(url) {
        debug!(url = %url, reason, "Skipping full text of inaccessible host");
        return None;
    }

    match ctx
        .fetcher
        .fetch_html(url.as_str(), ctx.config.entry_fetch_timeout())
        .await
    {
        Ok(page) => Some(page),
        Err(e) => {
            debug!(url = %url, error = %e, "Full text download failed");
            None
        }
    }
}

fn current_url(urls: &UrlHistory) -> Option<Url> {
    urls.current().and_then(|u| Url::parse(u).ok())
}
