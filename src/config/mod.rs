//! Configuration management for Tributary.
//!
//! Configuration is read from `~/.config/tributary/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use crate::daemon::DaemonConfig;
use crate::favicon::FaviconConfig;
use crate::filter::SanitizeOptions;
use crate::poll::PollConfig;
use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub poll: PollConfig,
    pub favicon: FaviconConfig,
    pub filter: SanitizeOptions,
    pub daemon: DaemonConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from `path`, creating a commented default there if
    /// nothing exists yet.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::create_default_config(path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/tributary/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tributary").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# Tributary Configuration

[poll]
# Skip feeds fetched less than this many seconds ago
recency_period_secs = 300

# Deactivate a feed once its error count exceeds this
deactivation_threshold = 10

# Network timeouts in seconds
feed_fetch_timeout_secs = 10
entry_fetch_timeout_secs = 5

# Fan-out limits
max_concurrent_feeds = 10
max_concurrent_entries = 8

# Download each article's page instead of using the feed summary
fetch_full_text = true

[favicon]
# Cached icons older than this are ignored
max_age_days = 30

# Give up on a site after this many failed lookups
max_failure_count = 2

fetch_html_timeout_ms = 2000
fetch_image_timeout_ms = 1000

# Accepted icon size range in bytes
min_image_size = 50
max_image_size = 10240

[filter]
# Keep <img> elements in article content
keep_images = true

[daemon]
# Poll interval (e.g. "30m", "1h", "1d")
interval = "30m"

# Poll immediately when the daemon starts
update_on_start = true

# Drop expired favicon cache records after each run
compact_favicons = true
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid interval: {0}. Use format like '1h', '30m', '1d'")]
    Interval(String),
}
