mod common;

use chrono::Utc;
use tributary::domain::{Entry, FaviconCacheEntry, Feed};
use tributary::poll::PollOptions;
use tributary::store::{FaviconStore, Store};
use wiremock::matchers::{any, header_exists, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

fn forced() -> PollOptions {
    PollOptions {
        ignore_recency_check: true,
    }
}

#[tokio::test]
async fn test_poll_follows_entry_redirects_and_dedups_on_rerun() {
    let server = MockServer::start().await;
    let base = server.uri();
    let feed_url = format!("{base}/feed");

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(feed_response(rss(
            "Tributary Test",
            &format!("{base}/"),
            &[("X", &format!("{base}/x")), ("Y", &format!("{base}/y"))],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/x2"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x2"))
        .respond_with(html_response(html_page("X2")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/y"))
        .respond_with(html_response(html_page("Y")))
        .mount(&server)
        .await;
    mount_favicon(&server).await;

    let (ctx, mut rx) = context_with_channel();
    let feed = ctx.store.upsert_feed(&Feed::new(feed_url.clone())).unwrap();

    let summary = ctx.poller.run(forced()).await.unwrap();
    assert_eq!(summary.entries_added, 2);
    assert_eq!(rx.try_recv().unwrap(), 2);

    let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
    assert_eq!(stored.urls.as_slice(), &[feed_url.clone()]);
    assert_eq!(stored.title.as_deref(), Some("Tributary Test"));
    assert!(stored.date_fetched.is_some());

    let entries = ctx.store.get_entries_by_feed(feed.id).unwrap();
    assert_eq!(entries.len(), 2);
    for entry in &entries {
        assert_eq!(entry.feed_id, feed.id);
        assert_eq!(entry.feed_title.as_deref(), Some("Tributary Test"));
        assert_eq!(
            entry.favicon_url.as_deref(),
            Some(format!("{base}/favicon.ico").as_str())
        );
    }

    let x = ctx
        .store
        .get_entry(&Entry::generate_id(&format!("{base}/x")))
        .unwrap()
        .expect("entry x stored under its original URL");
    assert_eq!(
        x.urls.as_slice(),
        &[format!("{base}/x"), format!("{base}/x2")]
    );
    assert!(x.content.unwrap().contains("Body of X2"));
    assert!(ctx.store.entry_exists_by_url(&format!("{base}/x2")).unwrap());

    let rerun = ctx.poller.run(forced()).await.unwrap();
    assert_eq!(rerun.entries_added, 0);
    assert!(rx.try_recv().is_err());
    assert_eq!(ctx.store.count_entries().unwrap(), 2);
}

#[tokio::test]
async fn test_recently_fetched_feed_makes_no_requests() {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let ctx = context();
    let mut feed = Feed::new(format!("{}/feed", server.uri()));
    feed.date_fetched = Some(Utc::now() - chrono::Duration::minutes(1));
    ctx.store.upsert_feed(&feed).unwrap();

    let summary = ctx.poller.run(PollOptions::default()).await.unwrap();
    assert_eq!(summary.feeds_skipped, 1);
    assert_eq!(summary.entries_added, 0);
}

#[tokio::test]
async fn test_redirect_to_stored_entry_is_not_inserted() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(feed_response(rss(
            "Redirects",
            &format!("{base}/"),
            &[("New", &format!("{base}/new"))],
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/known"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/known"))
        .respond_with(html_response(html_page("Known")))
        .mount(&server)
        .await;

    let ctx = context();
    let feed = ctx
        .store
        .upsert_feed(&Feed::new(format!("{base}/feed")))
        .unwrap();
    ctx.store
        .create_entry(&Entry::new(feed.id, format!("{base}/known")))
        .unwrap();

    let summary = ctx.poller.run(forced()).await.unwrap();

    assert_eq!(summary.feeds_failed, 0);
    assert_eq!(summary.entries_added, 0);
    let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
    assert_eq!(stored.title.as_deref(), Some("Redirects"));
    assert_eq!(ctx.store.count_entries().unwrap(), 1);
    assert!(!ctx.store.entry_exists_by_url(&format!("{base}/new")).unwrap());
}

#[tokio::test]
async fn test_pipeline_rewrites_falls_back_and_backfills_titles() {
    let server = MockServer::start().await;
    let base = server.uri();

    let items = format!(
        "<item><title>Gone</title><link>{base}/gone</link><description>&lt;p&gt;feed summary&lt;/p&gt;</description></item>\
         <item><title>Tracked</title><link>{base}/r?utm_source=rss&amp;id=1</link></item>\
         <item><link>{base}/untitled</link><description>No title</description></item>\
         <item><title>Paywalled</title><link>https://www.nytimes.com/2024/story.html</link><description>Paywalled summary</description></item>"
    );
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(feed_response(rss_with_items("Pipeline", &format!("{base}/"), &items)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r"))
        .and(query_param("id", "1"))
        .and(query_param_is_missing("utm_source"))
        .respond_with(html_response(html_page("Rewritten")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/untitled"))
        .respond_with(html_response(html_page("Backfilled")))
        .mount(&server)
        .await;
    mount_favicon(&server).await;

    let ctx = context();
    // A cached origin icon keeps the paywalled entry's favicon lookup offline.
    ctx.favicon_store
        .favicon_put(&FaviconCacheEntry::found(
            "https://www.nytimes.com/",
            "https://www.nytimes.com/favicon.ico",
            Utc::now(),
        ))
        .unwrap();
    let feed = ctx
        .store
        .upsert_feed(&Feed::new(format!("{base}/feed")))
        .unwrap();

    let summary = ctx.poller.run(forced()).await.unwrap();
    assert_eq!(summary.entries_added, 4);

    let entry = |url: &str| {
        ctx.store
            .get_entry(&Entry::generate_id(url))
            .unwrap()
            .unwrap_or_else(|| panic!("entry {url} stored"))
    };

    let gone = entry(&format!("{base}/gone"));
    assert_eq!(gone.content.as_deref(), Some("<p>feed summary</p>"));

    let tracked = entry(&format!("{base}/r?utm_source=rss&id=1"));
    assert_eq!(
        tracked.urls.as_slice(),
        &[format!("{base}/r?utm_source=rss&id=1"), format!("{base}/r?id=1")]
    );
    assert!(tracked.content.unwrap().contains("Body of Rewritten"));

    let untitled = entry(&format!("{base}/untitled"));
    assert_eq!(untitled.title.as_deref(), Some("Backfilled"));

    let paywalled = entry("https://www.nytimes.com/2024/story.html");
    assert_eq!(paywalled.content.as_deref(), Some("Paywalled summary"));
    assert_eq!(
        paywalled.favicon_url.as_deref(),
        Some("https://www.nytimes.com/favicon.ico")
    );

    assert_eq!(ctx.store.get_entries_by_feed(feed.id).unwrap().len(), 4);
}

#[tokio::test]
async fn test_parse_failures_deactivate_after_threshold() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(feed_response("this is not a feed".to_string()))
        .mount(&server)
        .await;

    let ctx = context();
    let feed = ctx
        .store
        .upsert_feed(&Feed::new(format!("{}/feed", server.uri())))
        .unwrap();

    for _ in 0..11 {
        ctx.poller.run(forced()).await.unwrap();
    }

    let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
    assert!(!stored.active);
    assert_eq!(stored.error_count, Some(11));
    assert!(stored.deactivation_date.is_some());

    // Inactive feeds are no longer polled.
    let summary = ctx.poller.run(forced()).await.unwrap();
    assert_eq!(summary.feeds_considered, 0);
}

#[tokio::test]
async fn test_unreachable_feed_stays_active() {
    let ctx = context();
    let feed = ctx
        .store
        .upsert_feed(&Feed::new("http://127.0.0.1:9/feed".into()))
        .unwrap();

    for _ in 0..11 {
        let summary = ctx.poller.run(forced()).await.unwrap();
        assert_eq!(summary.feeds_failed, 1);
    }

    let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
    assert!(stored.active);
    assert_eq!(stored.error_count, None);
}

#[tokio::test]
async fn test_http_errors_count_against_feed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ctx = context();
    let feed = ctx
        .store
        .upsert_feed(&Feed::new(format!("{}/feed", server.uri())))
        .unwrap();

    ctx.poller.run(forced()).await.unwrap();

    let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
    assert!(stored.active);
    assert_eq!(stored.error_count, Some(1));
}

#[tokio::test]
async fn test_not_modified_decrements_error_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .and(header_exists("if-modified-since"))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context();
    let mut feed = Feed::new(format!("{}/feed", server.uri()));
    feed.date_last_modified = Some(Utc::now() - chrono::Duration::days(1));
    feed.error_count = Some(2);
    let feed = ctx.store.upsert_feed(&feed).unwrap();

    let summary = ctx.poller.run(forced()).await.unwrap();
    assert_eq!(summary.entries_added, 0);

    let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
    assert_eq!(stored.error_count, Some(1));
    assert!(stored.active);
}

#[tokio::test]
async fn test_feed_redirect_extends_url_history() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/old-feed"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/feed"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(feed_response(rss("Moved", &format!("{base}/"), &[])))
        .mount(&server)
        .await;

    let ctx = context();
    let feed = ctx
        .store
        .upsert_feed(&Feed::new(format!("{base}/old-feed")))
        .unwrap();

    ctx.poller.run(forced()).await.unwrap();

    let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
    assert_eq!(
        stored.urls.as_slice(),
        &[format!("{base}/old-feed"), format!("{base}/feed")]
    );
    assert_eq!(stored.current_url(), Some(format!("{base}/feed").as_str()));
    assert!(ctx
        .store
        .get_feed_by_url(&format!("{base}/old-feed"))
        .unwrap()
        .is_some());
}
