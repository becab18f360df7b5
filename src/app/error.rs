use thiserror::Error;

#[derive(Error, Debug)]
pub enum TributaryError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Unacceptable content type {content_type:?} for {url}")]
    UnacceptableContentType {
        url: String,
        content_type: String,
    },

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Feed not found: {0}")]
    FeedNotFound(String),

    #[error("Feed already subscribed: {0}")]
    FeedExists(String),

    #[error("Entry already exists: {0}")]
    EntryExists(String),

    #[error("A poll run is already in progress")]
    PollInProgress,

    #[error("Invariant violated: {0}")]
    Invariant(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl TributaryError {
    /// Errors caused by the network rather than the remote content.
    ///
    /// These never count against a feed's error count.
    pub fn is_transient(&self) -> bool {
        match self {
            TributaryError::Timeout(_) => true,
            TributaryError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TributaryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_transient() {
        assert!(TributaryError::Timeout("https://a.example/feed".into()).is_transient());
    }

    #[test]
    fn test_content_errors_are_not_transient() {
        assert!(!TributaryError::FeedParse("bad xml".into()).is_transient());
        assert!(!TributaryError::HttpStatus {
            url: "https://a.example/feed".into(),
            status: 404,
        }
        .is_transient());
        assert!(!TributaryError::UnacceptableContentType {
            url: "https://a.example/feed".into(),
            content_type: "image/png".into(),
        }
        .is_transient());
    }

    #[test]
    fn test_entry_exists_message() {
        let err = TributaryError::EntryExists("https://a.example/x".into());
        assert_eq!(err.to_string(), "Entry already exists: https://a.example/x");
    }
}
