//! Parsed HTML documents.
//!
//! `scraper::Html` is neither `Send` nor `Sync`, so a [`Document`] keeps the
//! source text and parses on demand inside synchronous helpers. Nothing here
//! holds a parsed tree across an `.await`.

use scraper::{Html, Selector};
use url::Url;

/// `rel` values that identify a site icon, most preferred first.
const ICON_RELS: &[&str] = &[
    "icon",
    "shortcut icon",
    "apple-touch-icon",
    "apple-touch-icon-precomposed",
];

const PLACEHOLDER: &str =
    "<html><head></head><body><p>Unable to download content for this article.</p></body></html>";

#[derive(Debug, Clone)]
pub struct Document {
    source: String,
}

impl Document {
    pub fn parse(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Minimal document used when neither a download nor the feed supplied
    /// any content.
    pub fn placeholder() -> Self {
        Self::parse(PLACEHOLDER)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn html(&self) -> Html {
        Html::parse_document(&self.source)
    }

    /// Text of the first `<title>` element, whitespace-collapsed.
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        let html = self.html();
        let title = html
            .select(&selector)
            .next()?
            .text()
            .collect::<Vec<_>>()
            .join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        (!title.is_empty()).then_some(title)
    }

    /// The base URL for resolving relative links: a valid `<base href>` or
    /// the URL the document was fetched from.
    pub fn base_url(&self, fetched_from: &Url) -> Url {
        let Ok(selector) = Selector::parse("base[href]") else {
            return fetched_from.clone();
        };
        let html = self.html();
        html.select(&selector)
            .next()
            .and_then(|base| base.value().attr("href"))
            .and_then(|href| fetched_from.join(href.trim()).ok())
            .unwrap_or_else(|| fetched_from.clone())
    }

    /// Icon URLs declared in `<head>`, resolved against `base`, in preference
    /// order. Unresolvable hrefs are skipped.
    pub fn icon_candidates(&self, base: &Url) -> Vec<Url> {
        let Ok(selector) = Selector::parse("head link[rel][href]") else {
            return Vec::new();
        };
        let html = self.html();

        let links: Vec<(String, String)> = html
            .select(&selector)
            .filter_map(|link| {
                let rel = link.value().attr("rel")?;
                let href = link.value().attr("href")?.trim();
                if href.is_empty() {
                    return None;
                }
                let rel = rel.split_whitespace().collect::<Vec<_>>().join(" ");
                Some((rel.to_ascii_lowercase(), href.to_string()))
            })
            .collect();

        let mut candidates = Vec::new();
        for wanted in ICON_RELS {
            for (rel, href) in &links {
                if rel != wanted {
                    continue;
                }
                if let Ok(url) = base.join(href) {
                    if !candidates.contains(&url) {
                        candidates.push(url);
                    }
                }
            }
        }
        candidates
    }
}
