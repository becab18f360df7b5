pub mod classify;
pub mod http_fetcher;

use std::time::Duration;

use async_trait::async_trait;

use crate::app::Result;

#[derive(Debug)]
pub enum FetchResult {
    /// New content fetched successfully
    Content {
        /// Final URL after redirects
        response_url: String,
        body: Vec<u8>,
        content_type: Option<String>,
        last_modified: Option<String>,
    },
    /// Content not modified (HTTP 304)
    NotModified,
}

/// An HTML page downloaded for an entry or a favicon lookup.
#[derive(Debug, Clone)]
pub struct HtmlPage {
    /// Final URL after redirects
    pub response_url: String,
    pub body: String,
}

/// Response metadata of a HEAD request against a candidate icon.
#[derive(Debug, Clone)]
pub struct ImageProbe {
    pub response_url: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
}

impl ImageProbe {
    /// Whether the response looks like an icon we would accept.
    ///
    /// A missing content type or length is given the benefit of the doubt.
    pub fn is_plausible_image(&self, min_size: u64, max_size: u64) -> bool {
        if let Some(content_type) = self.content_type.as_deref() {
            if !classify::is_image_content_type(content_type) {
                return false;
            }
        }
        match self.content_length {
            Some(len) => len >= min_size && len <= max_size,
            None => true,
        }
    }
}

/// Network access used by the ingestion core. Every call carries its own
/// timeout; exceeding it yields `TributaryError::Timeout`.
#[async_trait]
pub trait Fetcher {
    async fn fetch_feed(
        &self,
        url: &str,
        last_modified: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchResult>;

    /// GET an article page. Non-HTML responses are rejected.
    async fn fetch_html(&self, url: &str, timeout: Duration) -> Result<HtmlPage>;

    /// HEAD a candidate image.
    async fn probe_image(&self, url: &str, timeout: Duration) -> Result<ImageProbe>;
}
