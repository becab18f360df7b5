mod common;

use std::sync::Arc;

use tributary::document::Document;
use tributary::favicon::{FaviconCache, FaviconConfig};
use tributary::fetcher::http_fetcher::HttpFetcher;
use tributary::store::{FaviconStore, SqliteFaviconStore};
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

fn cache() -> (FaviconCache, Arc<SqliteFaviconStore>) {
    let store = Arc::new(SqliteFaviconStore::in_memory().unwrap());
    let cache = FaviconCache::new(
        store.clone(),
        Arc::new(HttpFetcher::new()),
        FaviconConfig::default(),
    );
    (cache, store)
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn test_lookup_finds_declared_icon_and_caches_it() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html_response(
            r#"<html><head><link rel="icon" href="/static/icon.png"></head><body></body></html>"#
                .to_string(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/static/icon.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8; 900], "image/png"))
        .mount(&server)
        .await;

    let (cache, store) = cache();
    let page = Url::parse(&format!("{base}/page")).unwrap();

    let icon = cache.lookup(&page, None).await.unwrap();
    assert_eq!(icon, Some(format!("{base}/static/icon.png")));
    assert_eq!(
        store.favicon_get(page.as_str()).unwrap().unwrap().icon_url,
        icon
    );

    let requests = request_count(&server).await;
    assert_eq!(cache.lookup(&page, None).await.unwrap(), icon);
    assert_eq!(request_count(&server).await, requests);
}

#[tokio::test]
async fn test_lookup_falls_back_to_favicon_ico() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(html_response(html_page("No icons here")))
        .mount(&server)
        .await;
    mount_favicon(&server).await;

    let (cache, store) = cache();
    let page = Url::parse(&format!("{base}/page")).unwrap();

    let icon = cache.lookup(&page, None).await.unwrap();
    assert_eq!(icon, Some(format!("{base}/favicon.ico")));

    let origin = store.favicon_get(&format!("{base}/")).unwrap().unwrap();
    assert_eq!(origin.icon_url, icon);
    assert_eq!(origin.failure_count, 0);
}

#[tokio::test]
async fn test_supplied_document_skips_page_fetch() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/touch.png"))
        .respond_with(icon_response())
        .mount(&server)
        .await;

    let (cache, _) = cache();
    let page = Url::parse(&format!("{base}/article")).unwrap();
    let document = Document::parse(
        r#"<html><head><link rel="apple-touch-icon" href="/touch.png"></head></html>"#,
    );

    let icon = cache.lookup(&page, Some(&document)).await.unwrap();
    assert_eq!(icon, Some(format!("{base}/touch.png")));
}

#[tokio::test]
async fn test_failed_lookups_back_off() {
    let server = MockServer::start().await;
    let base = server.uri();

    let (cache, store) = cache();
    let page = Url::parse(&format!("{base}/page")).unwrap();

    assert_eq!(cache.lookup(&page, None).await.unwrap(), None);
    let origin = store.favicon_get(&format!("{base}/")).unwrap().unwrap();
    assert_eq!(origin.failure_count, 1);
    assert_eq!(origin.icon_url, None);

    assert_eq!(cache.lookup(&page, None).await.unwrap(), None);
    let origin = store.favicon_get(&format!("{base}/")).unwrap().unwrap();
    assert_eq!(origin.failure_count, 2);

    let requests = request_count(&server).await;
    assert!(requests > 0);

    assert_eq!(cache.lookup(&page, None).await.unwrap(), None);
    assert_eq!(request_count(&server).await, requests);
    let origin = store.favicon_get(&format!("{base}/")).unwrap().unwrap();
    assert_eq!(origin.failure_count, 2);
}

#[tokio::test]
async fn test_clear_empties_cache() {
    let server = MockServer::start().await;
    mount_favicon(&server).await;

    let (cache, store) = cache();
    let page = Url::parse(&format!("{}/", server.uri())).unwrap();
    assert!(cache.lookup(&page, None).await.unwrap().is_some());

    assert!(cache.clear().unwrap() >= 1);
    assert!(store.favicon_get(page.as_str()).unwrap().is_none());
    assert_eq!(cache.compact().unwrap(), 0);
}

#[tokio::test]
async fn test_refresh_feed_icons_updates_changed_feeds() {
    use tributary::domain::Feed;
    use tributary::store::Store;

    let server = MockServer::start().await;
    let base = server.uri();
    mount_favicon(&server).await;

    let ctx = context();
    let mut feed = Feed::new(format!("{base}/feed"));
    feed.link = Some(format!("{base}/"));
    let feed = ctx.store.upsert_feed(&feed).unwrap();

    assert_eq!(ctx.poller.refresh_feed_icons().await.unwrap(), 1);
    let stored = ctx.store.get_feed(feed.id).unwrap().unwrap();
    assert_eq!(stored.favicon_url, Some(format!("{base}/favicon.ico")));

    assert_eq!(ctx.poller.refresh_feed_icons().await.unwrap(), 0);
}
