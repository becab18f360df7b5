//! Shared fixtures for the wiremock-backed integration tests

#![allow(dead_code)]

use std::sync::Arc;

use tributary::app::AppContext;
use tributary::config::Config;
use tributary::fetcher::http_fetcher::HttpFetcher;
use tributary::notify::{ChannelNotifier, LogNotifier};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.poll.feed_fetch_timeout_secs = 2;
    config.poll.entry_fetch_timeout_secs = 2;
    config
}

pub fn context() -> AppContext {
    AppContext::in_memory_with(Arc::new(HttpFetcher::new()), test_config(), Arc::new(LogNotifier))
        .expect("in-memory context")
}

pub fn context_with_channel() -> (AppContext, mpsc::Receiver<usize>) {
    let (notifier, rx) = ChannelNotifier::channel(8);
    let ctx = AppContext::in_memory_with(Arc::new(HttpFetcher::new()), test_config(), Arc::new(notifier))
        .expect("in-memory context");
    (ctx, rx)
}

pub fn rss(title: &str, site: &str, items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, link)| {
            format!(
                "<item><title>{title}</title><link>{link}</link><description>Summary of {title}</description></item>"
            )
        })
        .collect();
    rss_with_items(title, site, &items)
}

/// Channel wrapper around hand-written `<item>` markup.
pub fn rss_with_items(title: &str, site: &str, items: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>{title}</title><link>{site}</link><description>Test</description>{items}</channel></rss>"#
    )
}

pub fn html_page(title: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body><article><p>Body of {title}</p></article></body></html>"
    )
}

// `set_body_string` forces text/plain, so bodies go through `set_body_raw`.
pub fn feed_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "application/rss+xml")
}

pub fn html_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=utf-8")
}

/// A plausibly sized icon.
pub fn icon_response() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(vec![0u8; 1150], "image/x-icon")
}

pub async fn mount_favicon(server: &MockServer) {
    Mock::given(method("HEAD"))
        .and(path("/favicon.ico"))
        .respond_with(icon_response())
        .mount(server)
        .await;
}
