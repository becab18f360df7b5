use chrono::{DateTime, Utc};
use feed_rs::model::Link;
use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{Result, TributaryError};

/// Feed-level fields of a parsed document.
#[derive(Debug, Clone, Default)]
pub struct FeedMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
}

/// One entry as the parser returns it, before it is coerced into an
/// [`Entry`](crate::domain::Entry).
#[derive(Debug, Clone, Default)]
pub struct ParsedEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub author: Option<String>,
    /// Full content when the feed has it, otherwise the summary.
    pub content: Option<String>,
    pub date_published: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub meta: FeedMeta,
    pub entries: Vec<ParsedEntry>,
}

#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse RSS 0.9x/1.0/2.0, Atom or JSON Feed bytes.
    pub fn parse(&self, body: &[u8]) -> Result<ParsedFeed> {
        let feed = parser::parse(body).map_err(|e| TributaryError::FeedParse(e.to_string()))?;

        let meta = FeedMeta {
            title: feed.title.map(|t| decode_html_entities(&t.content).trim().to_string()),
            description: feed
                .description
                .map(|d| decode_html_entities(&d.content).to_string()),
            link: site_link(&feed.links),
            date_published: feed.published.or(feed.updated),
        };

        let entries = feed
            .entries
            .into_iter()
            .map(|entry| ParsedEntry {
                title: entry
                    .title
                    .map(|t| decode_html_entities(&t.content).trim().to_string())
                    .filter(|t| !t.is_empty()),
                link: site_link(&entry.links),
                author: entry.authors.first().map(|a| a.name.clone()),
                content: entry
                    .content
                    .and_then(|c| c.body)
                    .or(entry.summary.map(|s| s.content)),
                date_published: entry.published.or(entry.updated),
            })
            .collect();

        Ok(ParsedFeed { meta, entries })
    }
}

/// The link pointing at the human-readable page, not the feed itself or an
/// attachment.
fn site_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| {
            links
                .iter()
                .find(|l| !matches!(l.rel.as_deref(), Some("self") | Some("enclosure")))
        })
        .map(|l| l.href.trim().to_string())
}
