use serde::{Deserialize, Serialize};

/// Ordered, append-only list of the URLs a record has been known by.
///
/// The oldest URL comes first and the current one last. A URL that is
/// already present is never appended a second time, and nothing is ever
/// removed or reordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlHistory(Vec<String>);

impl UrlHistory {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self(vec![url.into()])
    }

    /// Append `url` unless it is already present. Returns whether it was added.
    pub fn append(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if self.contains(&url) {
            return false;
        }
        self.0.push(url);
        true
    }

    /// Append every URL of `other` in order, skipping ones already present.
    pub fn merge(&mut self, other: &UrlHistory) -> usize {
        other.iter().filter(|url| self.append(url.as_str())).count()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.0.iter().any(|u| u == url)
    }

    pub fn current(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for UrlHistory {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut history = UrlHistory::new();
        for url in iter {
            history.append(url);
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_refuses_duplicates() {
        let mut urls = UrlHistory::from_url("https://a.example/feed");
        assert!(!urls.append("https://a.example/feed"));
        assert!(urls.append("https://b.example/feed"));
        assert_eq!(urls.len(), 2);
        assert_eq!(urls.current(), Some("https://b.example/feed"));
        assert!(urls.contains("https://a.example/feed"));
    }

    #[test]
    fn test_merge_preserves_order_and_history() {
        let mut local: UrlHistory = ["https://a.example/1", "https://a.example/2"]
            .into_iter()
            .collect();
        let remote: UrlHistory = ["https://a.example/2", "https://a.example/3"]
            .into_iter()
            .collect();

        assert_eq!(local.merge(&remote), 1);
        assert_eq!(
            local.as_slice(),
            &[
                "https://a.example/1".to_string(),
                "https://a.example/2".to_string(),
                "https://a.example/3".to_string(),
            ]
        );
    }

    #[test]
    fn test_merge_never_shrinks() {
        let mut local: UrlHistory = ["https://a.example/1", "https://a.example/2"]
            .into_iter()
            .collect();
        local.merge(&UrlHistory::new());
        local.merge(&UrlHistory::from_url("https://a.example/1"));
        assert_eq!(local.len(), 2);
        assert_eq!(local.current(), Some("https://a.example/2"));
    }

    #[test]
    fn test_serializes_as_plain_array() {
        let urls: UrlHistory = ["https://a.example/1", "https://a.example/2"]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&urls).unwrap();
        assert_eq!(json, r#"["https://a.example/1","https://a.example/2"]"#);
        let back: UrlHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, urls);
    }
}
