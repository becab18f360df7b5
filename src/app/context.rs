use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app::error::{Result, TributaryError};
use crate::config::Config;
use crate::favicon::FaviconCache;
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::Fetcher;
use crate::notify::{LogNotifier, Notifier};
use crate::poll::{PollContext, Poller};
use crate::store::{SqliteFaviconStore, SqliteStore};

const DB_FILE: &str = "tributary.db";
const FAVICON_DB_FILE: &str = "favicons.db";

/// Database locations. `None` means the default under the data directory.
#[derive(Debug, Clone, Default)]
pub struct StorePaths {
    pub database: Option<PathBuf>,
    pub favicons: Option<PathBuf>,
}

pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub favicon_store: Arc<SqliteFaviconStore>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub favicons: Arc<FaviconCache>,
    pub poller: Poller<SqliteStore>,
    pub config: Config,
}

impl AppContext {
    pub fn new(paths: StorePaths, config: Config) -> Result<Self> {
        let database = match paths.database {
            Some(p) => p,
            None => Self::default_data_dir()?.join(DB_FILE),
        };
        let favicons = match paths.favicons {
            Some(p) => p,
            None => sibling(&database, FAVICON_DB_FILE),
        };

        let store = Arc::new(SqliteStore::new(&database)?);
        let favicon_store = Arc::new(SqliteFaviconStore::new(&favicons)?);
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new());

        Ok(Self::assemble(store, favicon_store, fetcher, config, Arc::new(LogNotifier)))
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher + Send + Sync> = Arc::new(HttpFetcher::new());
        Self::in_memory_with(fetcher, config, Arc::new(LogNotifier))
    }

    /// In-memory stores around a caller-supplied fetcher and notifier.
    pub fn in_memory_with(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        config: Config,
        notifier: Arc<dyn Notifier + Send + Sync>,
    ) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        let favicon_store = Arc::new(SqliteFaviconStore::in_memory()?);
        Ok(Self::assemble(store, favicon_store, fetcher, config, notifier))
    }

    fn assemble(
        store: Arc<SqliteStore>,
        favicon_store: Arc<SqliteFaviconStore>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        config: Config,
        notifier: Arc<dyn Notifier + Send + Sync>,
    ) -> Self {
        let favicons = Arc::new(FaviconCache::new(
            favicon_store.clone(),
            fetcher.clone(),
            config.favicon.clone(),
        ));
        let poll_ctx = PollContext::new(
            store.clone(),
            fetcher.clone(),
            favicons.clone(),
            config.poll.clone(),
        )
        .with_sanitize_options(config.filter.clone());
        let poller = Poller::new(poll_ctx).with_notifier(notifier);

        Self {
            store,
            favicon_store,
            fetcher,
            favicons,
            poller,
            config,
        }
    }

    fn default_data_dir() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| TributaryError::Config("Could not find data directory".into()))?;
        let tributary_dir = data_dir.join("tributary");
        std::fs::create_dir_all(&tributary_dir)?;
        Ok(tributary_dir)
    }
}

fn sibling(path: &Path, file_name: &str) -> PathBuf {
    path.parent()
        .map(|dir| dir.join(file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}
