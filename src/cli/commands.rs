use url::Url;

use crate::app::{AppContext, Result, TributaryError};
use crate::domain::Feed;
use crate::poll::PollOptions;
use crate::store::Store;

pub async fn subscribe(ctx: &AppContext, url: &str) -> Result<()> {
    let url = Url::parse(url)?.to_string();

    if ctx.store.get_feed_by_url(&url)?.is_some() {
        println!("Already subscribed: {}", url);
        return Ok(());
    }

    let feed_id = ctx.store.add_feed(&Feed::new(url.clone()))?;
    println!("Subscribed: {}", url);

    let feed = ctx
        .store
        .get_feed(feed_id)?
        .ok_or_else(|| TributaryError::FeedNotFound(url.clone()))?;

    match ctx.poller.run_feed(feed).await {
        Ok(count) => {
            if let Some(feed) = ctx.store.get_feed(feed_id)? {
                if let Some(title) = &feed.title {
                    println!("Feed title: {}", title);
                }
            }
            println!("Fetched {} entries", count);
        }
        Err(e) => eprintln!("Initial fetch failed: {}", e),
    }

    Ok(())
}

pub fn unsubscribe(ctx: &AppContext, url: &str) -> Result<()> {
    let feed = find_feed(ctx, url)?;
    ctx.store.delete_feed(feed.id)?;
    println!("Unsubscribed: {}", feed.display_title());
    Ok(())
}

pub fn activate(ctx: &AppContext, url: &str) -> Result<()> {
    let mut feed = find_feed(ctx, url)?;
    if feed.active {
        println!("Already active: {}", feed.display_title());
        return Ok(());
    }

    feed.activate();
    feed.date_updated = Some(chrono::Utc::now());
    ctx.store.upsert_feed(&feed)?;
    println!("Activated: {}", feed.display_title());
    Ok(())
}

pub fn list_feeds(ctx: &AppContext) -> Result<()> {
    let feeds = ctx.store.get_all_feeds()?;

    if feeds.is_empty() {
        println!("No feeds");
        return Ok(());
    }

    for feed in feeds {
        let entries = ctx.store.get_entries_by_feed(feed.id)?.len();
        let status = match (feed.active, feed.error_count) {
            (false, _) => format!(
                "inactive: {}",
                feed.deactivation_reason.as_deref().unwrap_or("unknown reason")
            ),
            (true, Some(errors)) => format!("{} errors", errors),
            (true, None) => "ok".to_string(),
        };
        println!(
            "{} ({} entries, {})\n  {}",
            feed.display_title(),
            entries,
            status,
            feed.current_url().unwrap_or_default()
        );
    }

    Ok(())
}

pub fn list_entries(ctx: &AppContext) -> Result<()> {
    let mut count = 0;

    for feed in ctx.store.get_all_feeds()? {
        for entry in ctx.store.get_entries_by_feed(feed.id)? {
            let date = entry
                .date_published
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "          ".to_string());
            println!(
                "{} {} [{}]",
                date,
                entry.display_title(),
                feed.display_title()
            );
            count += 1;
        }
    }

    if count == 0 {
        println!("No entries");
    }

    Ok(())
}

pub async fn poll(ctx: &AppContext, force: bool) -> Result<()> {
    let summary = ctx
        .poller
        .run(PollOptions {
            ignore_recency_check: force,
        })
        .await?;

    println!(
        "Poll complete: {} new entries from {} feeds ({} skipped, {} failed)",
        summary.entries_added,
        summary.feeds_considered - summary.feeds_skipped,
        summary.feeds_skipped,
        summary.feeds_failed
    );
    Ok(())
}

pub async fn refresh_icons(ctx: &AppContext) -> Result<()> {
    let updated = ctx.poller.refresh_feed_icons().await?;
    println!("Updated icons of {} feeds", updated);
    Ok(())
}

pub async fn favicon_lookup(ctx: &AppContext, url: &str) -> Result<()> {
    let url = Url::parse(url)?;
    match ctx.favicons.lookup(&url, None).await? {
        Some(icon) => println!("{}", icon),
        None => println!("No icon found for {}", url),
    }
    Ok(())
}

pub fn favicon_compact(ctx: &AppContext) -> Result<()> {
    let deleted = ctx.favicons.compact()?;
    println!("Removed {} expired favicon records", deleted);
    Ok(())
}

pub fn favicon_clear(ctx: &AppContext) -> Result<()> {
    let deleted = ctx.favicons.clear()?;
    println!("Removed {} favicon records", deleted);
    Ok(())
}

fn find_feed(ctx: &AppContext, url: &str) -> Result<Feed> {
    ctx.store
        .get_feed_by_url(url)?
        .ok_or_else(|| TributaryError::FeedNotFound(url.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn context() -> AppContext {
        AppContext::in_memory(Config::default()).unwrap()
    }

    #[test]
    fn test_unsubscribe_unknown_feed() {
        let ctx = context();
        assert!(matches!(
            unsubscribe(&ctx, "https://a.example/feed"),
            Err(TributaryError::FeedNotFound(_))
        ));
    }

    #[test]
    fn test_activate_resets_failure_state() {
        let ctx = context();
        let mut feed = Feed::new("https://a.example/feed".into());
        feed.record_failure(0, "HTTP status 500", chrono::Utc::now());
        assert!(!feed.active);
        let feed = ctx.store.upsert_feed(&feed).unwrap();

        activate(&ctx, "https://a.example/feed").unwrap();

        let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
        assert!(stored.active);
        assert_eq!(stored.error_count, None);
        assert!(stored.deactivation_date.is_none());
    }

    #[test]
    fn test_unsubscribe_removes_feed() {
        let ctx = context();
        ctx.store
            .add_feed(&Feed::new("https://a.example/feed".into()))
            .unwrap();
        unsubscribe(&ctx, "https://a.example/feed").unwrap();
        assert!(ctx.store.get_all_feeds().unwrap().is_empty());
    }
}
