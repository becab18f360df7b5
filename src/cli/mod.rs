pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tributary")]
#[command(about = "Feed ingestion engine: polls feeds and stores their articles", long_about = None)]
pub struct Cli {
    /// Path to the feed database
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Path to the favicon cache database
    #[arg(long, global = true)]
    pub favicon_db: Option<PathBuf>,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subscribe to a feed and fetch it
    Subscribe {
        /// URL of the feed
        url: String,
    },
    /// Remove a feed and its entries
    Unsubscribe {
        /// Any URL the feed has been fetched from
        url: String,
    },
    /// Re-enable a deactivated feed
    Activate {
        /// Any URL the feed has been fetched from
        url: String,
    },
    /// List feeds or entries
    List {
        /// Show entries instead of feeds
        #[arg(long)]
        entries: bool,
    },
    /// Poll all active feeds
    Poll {
        /// Poll feeds even if they were fetched recently
        #[arg(short, long)]
        force: bool,
    },
    /// Re-resolve the icons of all active feeds
    RefreshIcons,
    /// Inspect or maintain the favicon cache
    Favicon {
        #[command(subcommand)]
        action: FaviconAction,
    },
    /// Background daemon for periodic polling
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
}

#[derive(Subcommand)]
pub enum FaviconAction {
    /// Look up the icon of a page
    Lookup {
        /// Page URL
        url: String,
    },
    /// Delete expired records
    Compact,
    /// Delete all records
    Clear,
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Start the daemon in the foreground
    Start {
        /// Poll interval (e.g., "1h", "30m", "6h", "1d"); overrides the config file
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip the initial poll on start
        #[arg(long)]
        no_initial_update: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}
