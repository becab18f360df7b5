//! Background daemon for periodic polling.
//!
//! Runs the poll orchestrator on an interval until SIGINT/SIGTERM, without
//! requiring system scheduler configuration.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::app::{AppContext, TributaryError};
use crate::config::ConfigError;
use crate::poll::PollOptions;

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Poll interval (default: "30m")
    pub interval: String,
    /// Whether to poll immediately on start
    pub update_on_start: bool,
    /// Whether to drop expired favicon records after each run
    pub compact_favicons: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval: "30m".to_string(),
            update_on_start: true,
            compact_favicons: true,
        }
    }
}

impl DaemonConfig {
    pub fn interval_secs(&self) -> Result<u64, ConfigError> {
        Self::parse_interval(&self.interval)
    }

    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> Result<u64, ConfigError> {
        let s = s.trim().to_lowercase();
        let invalid = || ConfigError::Interval(s.clone());

        let secs = if let Some(hours) = s.strip_suffix('h') {
            hours.parse::<u64>().map(|h| h * 3600)
        } else if let Some(minutes) = s.strip_suffix('m') {
            minutes.parse::<u64>().map(|m| m * 60)
        } else if let Some(days) = s.strip_suffix('d') {
            days.parse::<u64>().map(|d| d * 86400)
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
        } else {
            s.parse::<u64>()
        }
        .map_err(|_| invalid())?;

        if secs == 0 {
            return Err(invalid());
        }
        Ok(secs)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    config: DaemonConfig,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, config: DaemonConfig) -> Self {
        Self { ctx, config }
    }

    /// Get the PID file path
    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("tributary").join("daemon.pid"))
    }

    /// Check if another daemon is already running
    pub fn is_running() -> bool {
        Self::read_pid().is_some_and(Self::process_exists)
    }

    fn read_pid() -> Option<u32> {
        let pid_path = Self::pid_file_path()?;
        fs::read_to_string(pid_path).ok()?.trim().parse().ok()
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = Self::pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    /// Run the daemon until a shutdown signal arrives.
    pub async fn run(&self) -> crate::app::Result<()> {
        let interval_secs = self
            .config
            .interval_secs()
            .map_err(|e| TributaryError::Config(e.to_string()))?;

        if Self::is_running() {
            return Err(TributaryError::Other(
                "Another daemon instance is already running".to_string(),
            ));
        }

        self.write_pid_file()
            .map_err(|e| TributaryError::Other(format!("Failed to write PID file: {}", e)))?;

        info!(
            "Tributary daemon started (interval: {}, PID: {})",
            DaemonConfig::format_interval(interval_secs),
            std::process::id()
        );

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        let mut timer = interval(Duration::from_secs(interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        timer.tick().await;

        if self.config.update_on_start {
            tokio::select! {
                _ = self.run_update() => {}
                _ = &mut shutdown => {
                    self.remove_pid_file();
                    return Ok(());
                }
            }
        }

        loop {
            tokio::select! {
                _ = timer.tick() => self.run_update().await,
                _ = &mut shutdown => break,
            }
        }

        info!("Daemon shutting down");
        self.remove_pid_file();

        Ok(())
    }

    /// Run a single update cycle
    pub async fn run_update(&self) {
        match self.ctx.poller.run(PollOptions::default()).await {
            Ok(summary) => info!(
                "Update complete: {} new entries, {} feeds failed, {} skipped",
                summary.entries_added, summary.feeds_failed, summary.feeds_skipped
            ),
            Err(TributaryError::PollInProgress) => warn!("Previous poll still running"),
            Err(e) => error!("Poll failed: {}", e),
        }

        if self.config.compact_favicons {
            if let Err(e) = self.ctx.favicons.compact() {
                warn!("Favicon compaction failed: {}", e);
            }
        }
    }
}

/// Completes on SIGINT or SIGTERM (Ctrl-C on Windows).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
            }
            _ => {
                error!("Failed to install signal handlers");
                std::future::pending::<()>().await;
            }
        }
    }

    #[cfg(windows)]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Stop a running daemon by reading PID file and sending signal
pub fn stop_daemon() -> Result<(), String> {
    let pid_path =
        Daemon::pid_file_path().ok_or_else(|| "Could not determine PID file path".to_string())?;

    if !pid_path.exists() {
        return Err("No daemon is running (PID file not found)".to_string());
    }

    let pid = Daemon::read_pid().ok_or_else(|| "Invalid PID in PID file".to_string())?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status();

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status();

    let status = status.map_err(|e| format!("Failed to send signal: {}", e))?;
    if status.success() {
        let _ = fs::remove_file(&pid_path);
        Ok(())
    } else {
        Err(format!("Failed to stop daemon (PID {})", pid))
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    match Daemon::read_pid() {
        Some(pid) if Daemon::process_exists(pid) => format!("Daemon is running (PID: {})", pid),
        Some(_) => "Daemon is not running (stale PID file)".to_string(),
        None => "Daemon is not running".to_string(),
    }
}
