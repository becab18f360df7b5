use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::app::{Result, TributaryError};
use crate::domain::{Feed, RemoteFeed, UrlHistory};
use crate::fetcher::FetchResult;
use crate::poll::{entry, PollContext};
use crate::store::Store;

/// Fetch one feed, fold the result into the stored record and acquire its
/// new entries. Returns the number of entries created.
///
/// Content failures are recorded on the feed before the error is returned.
/// Transient failures leave the feed untouched.
pub(crate) async fn poll_feed<S: Store + Send + Sync + 'static>(
    ctx: &Arc<PollContext<S>>,
    mut feed: Feed,
) -> Result<usize> {
    let Some(url) = feed.current_url().map(str::to_string) else {
        error!(feed_id = feed.id, "Feed has no URL");
        return Err(TributaryError::Invariant(format!(
            "feed {} has no URL",
            feed.id
        )));
    };

    let if_modified_since = feed.date_last_modified.map(format_http_date);
    let fetched = ctx
        .fetcher
        .fetch_feed(
            &url,
            if_modified_since.as_deref(),
            ctx.config.feed_fetch_timeout(),
        )
        .await;

    let (response_url, body, last_modified) = match fetched {
        Ok(FetchResult::NotModified) => return unmodified(ctx, feed),
        Ok(FetchResult::Content {
            response_url,
            body,
            last_modified,
            ..
        }) => (response_url, body, last_modified),
        Err(e) if e.is_transient() => {
            info!(feed_id = feed.id, url = %url, error = %e, "Feed fetch failed, will retry");
            return Err(e);
        }
        Err(e) => return Err(record_content_failure(ctx, feed, e)),
    };

    let date_last_modified = last_modified.as_deref().and_then(parse_http_date);
    if date_last_modified.is_some() && date_last_modified == feed.date_last_modified {
        return unmodified(ctx, feed);
    }

    let parsed = match ctx.normalizer.parse(&body) {
        Ok(parsed) => parsed,
        Err(e) => return Err(record_content_failure(ctx, feed, e)),
    };

    let mut urls = UrlHistory::from_url(url.as_str());
    urls.append(response_url);

    feed.merge(RemoteFeed {
        urls,
        title: parsed.meta.title,
        description: parsed.meta.description,
        link: parsed.meta.link,
        date_published: parsed.meta.date_published,
        date_last_modified,
        date_fetched: Utc::now(),
    });
    let feed = ctx.store.upsert_feed(&feed)?;

    let added = entry::acquire_entries(ctx, &feed, parsed.entries).await;
    info!(
        feed_id = feed.id,
        url = %url,
        "Updated {}: {} new entries",
        feed.display_title(),
        added
    );

    Ok(added)
}

fn unmodified<S: Store>(ctx: &PollContext<S>, mut feed: Feed) -> Result<usize> {
    debug!(feed_id = feed.id, "Feed not modified");
    let now = Utc::now();
    feed.record_success();
    feed.date_fetched = Some(now);
    feed.date_updated = Some(now);
    ctx.store.upsert_feed(&feed)?;
    Ok(0)
}

/// Count `error` against the feed and persist it. Returns the error for the
/// caller to report, or the store error if persisting failed.
fn record_content_failure<S: Store>(
    ctx: &PollContext<S>,
    mut feed: Feed,
    error: TributaryError,
) -> TributaryError {
    let reason = error.to_string();
    if feed.record_failure(ctx.config.deactivation_threshold, &reason, Utc::now()) {
        warn!(
            feed_id = feed.id,
            url = feed.current_url().unwrap_or_default(),
            error_count = feed.error_count.unwrap_or(0),
            "Deactivated {}: {}",
            feed.display_title(),
            reason
        );
    } else {
        warn!(
            feed_id = feed.id,
            url = feed.current_url().unwrap_or_default(),
            error_count = feed.error_count.unwrap_or(0),
            "Feed failed: {}",
            reason
        );
    }

    match ctx.store.upsert_feed(&feed) {
        Ok(_) => error,
        Err(store_error) => store_error,
    }
}

/// `If-Modified-Since` form of a timestamp.
pub(crate) fn format_http_date(date: DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub(crate) fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
