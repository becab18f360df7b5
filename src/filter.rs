//! Content filtering: turns a fetched (or feed-supplied) document into the
//! sanitized HTML stored on an entry.

use html_escape::{encode_double_quoted_attribute, encode_text};
use scraper::{ElementRef, Node, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::document::Document;

/// Elements dropped together with everything inside them.
const REMOVED_ELEMENTS: &[&str] = &[
    "applet", "base", "button", "embed", "form", "frame", "frameset", "head", "iframe", "input",
    "link", "meta", "noscript", "object", "script", "select", "style", "template", "textarea",
    "title",
];

const IMAGE_ELEMENTS: &[&str] = &["img", "picture", "source"];

/// Elements whose tags are dropped but whose children are kept.
const UNWRAPPED_ELEMENTS: &[&str] = &["body", "center", "font", "html"];

const VOID_ELEMENTS: &[&str] = &["area", "br", "col", "hr", "img", "source", "track", "wbr"];

const ALLOWED_ATTRIBUTES: &[&str] = &[
    "alt", "cite", "colspan", "datetime", "dir", "height", "href", "lang", "rowspan", "src",
    "title", "width",
];

const URL_ATTRIBUTES: &[&str] = &["cite", "href", "src"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Keep `<img>` and friends (default: true)
    pub keep_images: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self { keep_images: true }
    }
}

pub trait ContentFilter {
    fn sanitize(&self, document: &Document, base_url: &Url, options: &SanitizeOptions) -> String;
}

/// Allow-list sanitizer: keeps the body's markup minus active content,
/// presentational attributes and event handlers, with relative URLs made
/// absolute against the base URL.
#[derive(Debug, Clone, Default)]
pub struct HtmlSanitizer;

impl HtmlSanitizer {
    pub fn new() -> Self {
        Self
    }

    fn write_children(out: &mut String, element: ElementRef<'_>, base: &Url, options: &SanitizeOptions) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(&encode_text(&**text)),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        Self::write_element(out, child, base, options);
                    }
                }
                _ => {}
            }
        }
    }

    fn write_element(out: &mut String, element: ElementRef<'_>, base: &Url, options: &SanitizeOptions) {
        let name = element.value().name();

        if REMOVED_ELEMENTS.contains(&name)
            || (!options.keep_images && IMAGE_ELEMENTS.contains(&name))
        {
            return;
        }
        if UNWRAPPED_ELEMENTS.contains(&name) {
            Self::write_children(out, element, base, options);
            return;
        }

        out.push('<');
        out.push_str(name);
        for (attr, value) in element.value().attrs() {
            let attr = attr.to_ascii_lowercase();
            if !ALLOWED_ATTRIBUTES.contains(&attr.as_str()) {
                continue;
            }
            let value = if URL_ATTRIBUTES.contains(&attr.as_str()) {
                match resolve(base, value) {
                    Some(url) => url,
                    None => continue,
                }
            } else {
                value.to_string()
            };
            out.push(' ');
            out.push_str(&attr);
            out.push_str("=\"");
            out.push_str(&encode_double_quoted_attribute(&value));
            out.push('"');
        }
        out.push('>');

        if VOID_ELEMENTS.contains(&name) {
            return;
        }

        Self::write_children(out, element, base, options);
        out.push_str("</");
        out.push_str(name);
        out.push('>');
    }
}

impl ContentFilter for HtmlSanitizer {
    fn sanitize(&self, document: &Document, base_url: &Url, options: &SanitizeOptions) -> String {
        let html = document.html();
        let mut out = String::new();

        match Selector::parse("body")
            .ok()
            .and_then(|selector| html.select(&selector).next())
        {
            Some(body) => Self::write_children(&mut out, body, base_url, options),
            None => Self::write_children(&mut out, html.root_element(), base_url, options),
        }

        out.trim().to_string()
    }
}

const LINK_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Absolute form of a link, or `None` for unlisted schemes and garbage.
fn resolve(base: &Url, value: &str) -> Option<String> {
    let url = base.join(value.trim()).ok()?;
    LINK_SCHEMES
        .contains(&url.scheme())
        .then(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitize(html: &str) -> String {
        let base = Url::parse("https://a.example/posts/1").unwrap();
        HtmlSanitizer::new().sanitize(&Document::parse(html), &base, &SanitizeOptions::default())
    }

    #[test]
    fn test_removes_scripts_and_handlers() {
        let out = sanitize(
            r#"<html><head><title>T</title><script>evil()</script></head>
               <body><p onclick="evil()" class="x">Hello <b>world</b></p><script>more()</script></body></html>"#,
        );
        assert_eq!(out, "<p>Hello <b>world</b></p>");
    }

    #[test]
    fn test_resolves_relative_urls() {
        let out = sanitize(r#"<body><a href="../about">About</a><img src="img.png"></body>"#);
        assert_eq!(
            out,
            r#"<a href="https://a.example/about">About</a><img src="https://a.example/posts/img.png">"#
        );
    }

    #[test]
    fn test_drops_javascript_links() {
        let out = sanitize(r#"<body><a href="javascript:alert(1)">x</a></body>"#);
        assert_eq!(out, "<a>x</a>");
    }

    #[test]
    fn test_keeps_only_web_and_mail_links() {
        let out = sanitize(
            r#"<body><a href="data:text/html,<script>alert(1)</script>">d</a><a href="mailto:me@a.example">m</a><img src="file:///etc/passwd"></body>"#,
        );
        assert_eq!(out, r#"<a>d</a><a href="mailto:me@a.example">m</a><img>"#);
    }

    #[test]
    fn test_escapes_text() {
        let out = sanitize("<body><p>1 &lt; 2 &amp; 3</p></body>");
        assert_eq!(out, "<p>1 &lt; 2 &amp; 3</p>");
    }

    #[test]
    fn test_unwraps_font_and_can_drop_images() {
        let base = Url::parse("https://a.example/").unwrap();
        let doc = Document::parse(r#"<body><font color="red">Hi</font><img src="/x.png"></body>"#);
        let out = HtmlSanitizer::new().sanitize(&doc, &base, &SanitizeOptions { keep_images: false });
        assert_eq!(out, "Hi");
    }

    #[test]
    fn test_fragment_content_from_feed() {
        let out = sanitize("Plain summary with <em>emphasis</em>");
        assert_eq!(out, "Plain summary with <em>emphasis</em>");
    }
}
