use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tributary::app::{AppContext, StorePaths};
use tributary::cli::{commands, Cli, Commands, DaemonAction, FaviconAction};
use tributary::config::Config;
use tributary::daemon::{daemon_status, stop_daemon, Daemon};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Stop and status only read the PID file.
    if let Commands::Daemon { action } = &cli.command {
        match action {
            DaemonAction::Stop => {
                stop_daemon().map_err(anyhow::Error::msg)?;
                println!("Daemon stopped");
                return Ok(());
            }
            DaemonAction::Status => {
                println!("{}", daemon_status());
                return Ok(());
            }
            DaemonAction::Start { .. } => {}
        }
    }

    let paths = StorePaths {
        database: cli.db,
        favicons: cli.favicon_db,
    };
    let ctx = AppContext::new(paths, config)?;

    match cli.command {
        Commands::Subscribe { url } => {
            commands::subscribe(&ctx, &url).await?;
        }
        Commands::Unsubscribe { url } => {
            commands::unsubscribe(&ctx, &url)?;
        }
        Commands::Activate { url } => {
            commands::activate(&ctx, &url)?;
        }
        Commands::List { entries } => {
            if entries {
                commands::list_entries(&ctx)?;
            } else {
                commands::list_feeds(&ctx)?;
            }
        }
        Commands::Poll { force } => {
            commands::poll(&ctx, force).await?;
        }
        Commands::RefreshIcons => {
            commands::refresh_icons(&ctx).await?;
        }
        Commands::Favicon { action } => match action {
            FaviconAction::Lookup { url } => commands::favicon_lookup(&ctx, &url).await?,
            FaviconAction::Compact => commands::favicon_compact(&ctx)?,
            FaviconAction::Clear => commands::favicon_clear(&ctx)?,
        },
        Commands::Daemon {
            action:
                DaemonAction::Start {
                    interval,
                    no_initial_update,
                },
        } => {
            let mut daemon_config = ctx.config.daemon.clone();
            if let Some(interval) = interval {
                daemon_config.interval = interval;
            }
            if no_initial_update {
                daemon_config.update_on_start = false;
            }
            Daemon::new(Arc::new(ctx), daemon_config).run().await?;
        }
        Commands::Daemon { .. } => {}
    }

    Ok(())
}
