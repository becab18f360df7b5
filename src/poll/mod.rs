//! Poll orchestration.
//!
//! A run loads the active feeds and processes each in its own task:
//! fetch, merge into the stored record, then acquire new entries with
//! another fan-out per feed. Failures are contained at the task that
//! raised them.

mod config;
mod entry;
mod feed;

pub use config::PollConfig;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::app::{Result, TributaryError};
use crate::domain::Feed;
use crate::favicon::{self, FaviconCache};
use crate::fetcher::Fetcher;
use crate::filter::{ContentFilter, HtmlSanitizer, SanitizeOptions};
use crate::normalizer::Normalizer;
use crate::notify::{LogNotifier, Notifier};
use crate::rewrite::{default_rules, RewriteRule};
use crate::store::Store;

/// Everything a feed task needs, shared by all tasks of a run.
pub struct PollContext<S> {
    pub store: Arc<S>,
    pub fetcher: Arc<dyn Fetcher + Send + Sync>,
    pub favicons: Arc<FaviconCache>,
    pub normalizer: Normalizer,
    pub filter: Arc<dyn ContentFilter + Send + Sync>,
    pub sanitize: SanitizeOptions,
    pub rules: Vec<RewriteRule>,
    pub config: PollConfig,
}

impl<S> PollContext<S> {
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        favicons: Arc<FaviconCache>,
        config: PollConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            favicons,
            normalizer: Normalizer::new(),
            filter: Arc::new(HtmlSanitizer::new()),
            sanitize: SanitizeOptions::default(),
            rules: default_rules(),
            config,
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn ContentFilter + Send + Sync>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sanitize_options(mut self, options: SanitizeOptions) -> Self {
        self.sanitize = options;
        self
    }

    pub fn with_rules(mut self, rules: Vec<RewriteRule>) -> Self {
        self.rules = rules;
        self
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PollOptions {
    /// Poll feeds even if they were fetched within the recency period.
    pub ignore_recency_check: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub feeds_considered: usize,
    pub feeds_skipped: usize,
    pub feeds_failed: usize,
    pub entries_added: usize,
}

pub struct Poller<S> {
    ctx: Arc<PollContext<S>>,
    notifier: Arc<dyn Notifier + Send + Sync>,
    running: AtomicBool,
}

impl<S: Store + Send + Sync + 'static> Poller<S> {
    pub fn new(ctx: PollContext<S>) -> Self {
        Self {
            ctx: Arc::new(ctx),
            notifier: Arc::new(LogNotifier),
            running: AtomicBool::new(false),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier + Send + Sync>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.ctx.store
    }

    /// Poll every active feed once.
    ///
    /// Fails with `PollInProgress` if another run of this poller has not
    /// finished yet.
    pub async fn run(&self, options: PollOptions) -> Result<PollSummary> {
        let _guard = RunGuard::acquire(&self.running)?;
        let start = Instant::now();

        let feeds = self.ctx.store.get_active_feeds()?;
        let recency = self.ctx.config.recency_period();
        let now = Utc::now();

        let semaphore = Arc::new(Semaphore::new(self.ctx.config.max_concurrent_feeds.max(1)));
        let mut tasks = JoinSet::new();
        let mut summary = PollSummary::default();

        for feed in feeds {
            summary.feeds_considered += 1;
            if !options.ignore_recency_check && feed.fetched_within(recency, now) {
                debug!(feed_id = feed.id, "Skipping recently fetched feed");
                summary.feeds_skipped += 1;
                continue;
            }

            let ctx = self.ctx.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let feed_id = feed.id;
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (feed_id, Ok(0));
                };
                (feed_id, feed::poll_feed(&ctx, feed).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(added))) => summary.entries_added += added,
                Ok((feed_id, Err(e))) => {
                    summary.feeds_failed += 1;
                    if matches!(e, TributaryError::Invariant(_)) {
                        error!(feed_id, "Feed task failed: {}", e);
                    } else {
                        debug!(feed_id, "Feed task failed: {}", e);
                    }
                }
                Err(e) => {
                    summary.feeds_failed += 1;
                    error!("Feed task join error: {}", e);
                }
            }
        }

        if summary.entries_added > 0 {
            self.notifier.entries_added(summary.entries_added);
        }

        info!(
            feeds = summary.feeds_considered,
            skipped = summary.feeds_skipped,
            failed = summary.feeds_failed,
            "Poll complete: {} new entries ({:.1}s)",
            summary.entries_added,
            start.elapsed().as_secs_f64()
        );

        Ok(summary)
    }

    /// Poll a single feed regardless of its recency or active flag.
    pub async fn run_feed(&self, feed: Feed) -> Result<usize> {
        let _guard = RunGuard::acquire(&self.running)?;
        let added = feed::poll_feed(&self.ctx, feed).await?;
        if added > 0 {
            self.notifier.entries_added(added);
        }
        Ok(added)
    }

    /// Re-resolve the favicon of every active feed.
    pub async fn refresh_feed_icons(&self) -> Result<usize> {
        let updated = favicon::refresh_feed_icons(&self.ctx.favicons, self.ctx.store.as_ref()).await?;
        info!("Updated icons of {} feeds", updated);
        Ok(updated)
    }
}

/// Holds the run flag for the lifetime of a run.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| TributaryError::PollInProgress)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
