//! # Tributary
//!
//! A feed reader's background ingestion engine: polls subscribed feeds,
//! fetches and deduplicates their articles, resolves site icons and stores
//! the results for later display.
//!
//! ## Architecture
//!
//! ```text
//! Poller → Fetcher → Normalizer → entry pipeline → Store
//!                                      ↓
//!                 rewrite → Document → FaviconCache → ContentFilter
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Subscribe to a feed
//! tributary subscribe https://blog.rust-lang.org/feed.xml
//!
//! # Poll all active feeds
//! tributary poll
//!
//! # Poll every 30 minutes until interrupted
//! tributary daemon start --interval 30m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// stores, fetcher, favicon cache, poller.
pub mod app;

/// Command-line interface using clap.
///
/// - `subscribe <url>` / `unsubscribe <url>` / `activate <url>`
/// - `list [--entries]`
/// - `poll [--force]`
/// - `refresh-icons`
/// - `favicon lookup|compact|clear`
/// - `daemon start|stop|status`
pub mod cli;

/// Configuration loaded from `~/.config/tributary/config.toml`.
pub mod config;

/// Background daemon running the poller on an interval.
pub mod daemon;

/// Parsed HTML documents: titles, base URLs and icon links.
pub mod document;

/// Core domain models.
///
/// - [`Feed`](domain::Feed): subscription with its URL history and failure state
/// - [`Entry`](domain::Entry): one article, identified by the SHA-256 of its first URL
/// - [`FaviconCacheEntry`](domain::FaviconCacheEntry): page URL to icon URL record
/// - [`UrlHistory`](domain::UrlHistory): append-only URL list
pub mod domain;

/// Favicon cache with expiry and per-site failure backoff.
pub mod favicon;

/// HTTP access.
///
/// - [`Fetcher`](fetcher::Fetcher): async trait for feed, page and icon requests
/// - [`HttpFetcher`](fetcher::http_fetcher::HttpFetcher): reqwest-based implementation
/// - [`classify`](fetcher::classify): content type and URL classification
pub mod fetcher;

/// Allow-list HTML sanitation of entry content.
pub mod filter;

/// Feed parsing.
///
/// Converts RSS 0.9x/1.0/2.0, Atom 0.3/1.0, and JSON Feed 1.0 documents
/// into [`ParsedFeed`](normalizer::ParsedFeed).
pub mod normalizer;

/// New entry notifications.
pub mod notify;

/// Poll orchestration, feed merging and the entry acquisition pipeline.
pub mod poll;

/// URL rewrite rules.
pub mod rewrite;

/// SQLite persistence layer.
///
/// - [`Store`](store::Store): feeds and entries
/// - [`FaviconStore`](store::FaviconStore): favicon cache records
pub mod store;
