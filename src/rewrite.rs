//! URL rewrite rules applied to entry URLs before identity checks.
//!
//! A rule is a pure function returning the rewritten URL, or `None` when it
//! does not apply. Rules run in order, each seeing the previous output.

use url::Url;

pub type RewriteRule = fn(&Url) -> Option<Url>;

pub fn default_rules() -> Vec<RewriteRule> {
    vec![
        unwrap_google_news,
        unwrap_facebook_exit,
        strip_techcrunch_ncid,
        strip_utm_params,
    ]
}

/// Apply `rules` in sequence. Returns the final URL only if it differs from
/// the input.
pub fn rewrite_url(url: &Url, rules: &[RewriteRule]) -> Option<Url> {
    let mut current = url.clone();
    for rule in rules {
        if let Some(next) = rule(&current) {
            current = next;
        }
    }
    (current != *url).then_some(current)
}

/// `https://news.google.com/news/url?url=<target>` -> `<target>`
pub fn unwrap_google_news(url: &Url) -> Option<Url> {
    if url.host_str() != Some("news.google.com") || url.path() != "/news/url" {
        return None;
    }
    query_param(url, "url").and_then(|target| Url::parse(&target).ok())
}

/// `https://l.facebook.com/l.php?u=<target>` -> `<target>`
pub fn unwrap_facebook_exit(url: &Url) -> Option<Url> {
    if url.host_str() != Some("l.facebook.com") || url.path() != "/l.php" {
        return None;
    }
    query_param(url, "u").and_then(|target| Url::parse(&target).ok())
}

pub fn strip_techcrunch_ncid(url: &Url) -> Option<Url> {
    let host = url.host_str()?;
    if host != "techcrunch.com" && !host.ends_with(".techcrunch.com") {
        return None;
    }
    remove_params(url, |key| key == "ncid")
}

pub fn strip_utm_params(url: &Url) -> Option<Url> {
    remove_params(url, |key| key.starts_with("utm_"))
}

fn query_param(url: &Url, name: &str) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

fn remove_params(url: &Url, drop: impl Fn(&str) -> bool) -> Option<Url> {
    url.query()?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !drop(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let total = url.query_pairs().count();
    if kept.len() == total {
        return None;
    }

    let mut rewritten = url.clone();
    if kept.is_empty() {
        rewritten.set_query(None);
    } else {
        rewritten.query_pairs_mut().clear().extend_pairs(kept);
    }
    Some(rewritten)
}
