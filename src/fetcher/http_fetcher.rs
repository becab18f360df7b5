use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE, IF_MODIFIED_SINCE,
    LAST_MODIFIED,
};
use reqwest::{Client, Response, StatusCode};

use crate::app::{Result, TributaryError};
use crate::fetcher::classify;
use crate::fetcher::{FetchResult, Fetcher, HtmlPage, ImageProbe};

const FEED_ACCEPT: &str = "application/rss+xml, application/rdf+xml, application/atom+xml, \
     application/feed+json, application/xml;q=0.9, text/xml;q=0.9, text/html;q=0.8";

const HTML_ACCEPT: &str = "text/html, application/xhtml+xml;q=0.9";

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        let client = Client::builder()
            .gzip(true)
            .brotli(true)
            .user_agent(concat!("tributary/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    fn header(response: &Response, name: reqwest::header::HeaderName) -> Option<String> {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    }

    fn check_status(url: &str, response: &Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(TributaryError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            })
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Give timeouts their own variant so callers can tell them apart cheaply.
fn map_err(url: &str, e: reqwest::Error) -> TributaryError {
    if e.is_timeout() {
        TributaryError::Timeout(url.to_string())
    } else {
        TributaryError::Http(e)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_feed(
        &self,
        url: &str,
        last_modified: Option<&str>,
        timeout: Duration,
    ) -> Result<FetchResult> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(FEED_ACCEPT));

        if let Some(last_modified) = last_modified {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        let response = self
            .client
            .get(url)
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_err(url, e))?;

        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchResult::NotModified);
        }

        Self::check_status(url, &response)?;

        let content_type = Self::header(&response, CONTENT_TYPE);
        if !classify::is_feed_content_type(content_type.as_deref()) {
            return Err(TributaryError::UnacceptableContentType {
                url: url.to_string(),
                content_type: content_type.unwrap_or_default(),
            });
        }

        let last_modified = Self::header(&response, LAST_MODIFIED);
        let response_url = response.url().to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_err(url, e))?
            .to_vec();

        Ok(FetchResult::Content {
            response_url,
            body,
            content_type,
            last_modified,
        })
    }

    async fn fetch_html(&self, url: &str, timeout: Duration) -> Result<HtmlPage> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, HTML_ACCEPT)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_err(url, e))?;

        Self::check_status(url, &response)?;

        let content_type = Self::header(&response, CONTENT_TYPE).unwrap_or_default();
        if !classify::is_html_content_type(&content_type) {
            return Err(TributaryError::UnacceptableContentType {
                url: url.to_string(),
                content_type,
            });
        }

        let response_url = response.url().to_string();
        let body = response.text().await.map_err(|e| map_err(url, e))?;

        Ok(HtmlPage { response_url, body })
    }

    async fn probe_image(&self, url: &str, timeout: Duration) -> Result<ImageProbe> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_err(url, e))?;

        Self::check_status(url, &response)?;

        Ok(ImageProbe {
            response_url: response.url().to_string(),
            content_type: Self::header(&response, CONTENT_TYPE),
            content_length: Self::header(&response, CONTENT_LENGTH)
                .and_then(|len| len.trim().parse().ok()),
        })
    }
}
