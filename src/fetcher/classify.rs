//! Cheap URL and content-type checks made before (or instead of) a download.

use url::Url;

/// Sites whose article pages are known not to yield usable content.
const INACCESSIBLE_HOSTS: &[(&str, &str)] = &[
    ("forbes.com", "interstitial advert"),
    ("productforums.google.com", "script generated"),
    ("groups.google.com", "script generated"),
    ("nytimes.com", "paywall"),
    ("wsj.com", "paywall"),
    ("heraldsun.com.au", "paywall"),
    ("ripe.net", "requires cookies"),
];

const BINARY_EXTENSIONS: &[&str] = &[
    "7z", "aac", "apk", "avi", "bin", "bmp", "dmg", "doc", "docx", "epub", "exe", "flac", "gif",
    "gz", "ico", "iso", "jpeg", "jpg", "m4a", "m4v", "mkv", "mov", "mp3", "mp4", "mpeg", "ogg",
    "pdf", "png", "ppt", "pptx", "rar", "tar", "tgz", "tif", "tiff", "wav", "webm", "webp",
    "xls", "xlsx", "zip",
];

const FEED_MIME_TYPES: &[&str] = &[
    "application/atom+xml",
    "application/feed+json",
    "application/json",
    "application/rdf+xml",
    "application/rss+xml",
    "application/xml",
    "text/html",
    "text/xml",
];

/// The bare, lowercased MIME type of a `Content-Type` header value.
pub fn mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// Content types a feed may be served as. A missing header is accepted.
pub fn is_feed_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        Some(ct) => FEED_MIME_TYPES.contains(&mime_type(ct).as_str()),
        None => true,
    }
}

pub fn is_html_content_type(content_type: &str) -> bool {
    matches!(
        mime_type(content_type).as_str(),
        "text/html" | "application/xhtml+xml"
    )
}

pub fn is_image_content_type(content_type: &str) -> bool {
    let mime = mime_type(content_type);
    mime.starts_with("image/") || mime == "application/octet-stream"
}

pub fn is_http_url(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// Guess from the path extension whether a URL points at non-HTML content.
pub fn is_binary_url(url: &Url) -> bool {
    let Some(segment) = url.path_segments().and_then(|mut s| s.next_back()) else {
        return false;
    };
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => {
            BINARY_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
        }
        _ => false,
    }
}

/// Why the article at `url` should not be downloaded, if it should not.
pub fn inaccessible_reason(url: &Url) -> Option<&'static str> {
    let host = url.host_str()?.to_ascii_lowercase();
    INACCESSIBLE_HOSTS
        .iter()
        .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{}", domain)))
        .map(|(_, reason)| *reason)
}
