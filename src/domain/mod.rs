pub mod entry;
pub mod favicon;
pub mod feed;
pub mod url_history;

pub use entry::Entry;
pub use favicon::FaviconCacheEntry;
pub use feed::{Feed, RemoteFeed};
pub use url_history::UrlHistory;
