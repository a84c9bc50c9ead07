//! On Air Server - headless server for the On Air daily broadcast player.
//!
//! Polls the broadcast feed, keeps today's broadcasts, and serves the
//! HTTP/WebSocket API that presenters and the browser audio client use.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use onair_core::{bind, bootstrap_services, start_server, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// On Air Server - daily broadcast player backend.
#[derive(Parser, Debug)]
#[command(name = "onair-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "ONAIR_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Broadcast feed URL (overrides config file).
    #[arg(short = 'f', long)]
    feed_url: Option<String>,

    /// Broadcast timezone as minutes east of UTC (overrides config file).
    #[arg(long, allow_hyphen_values = true)]
    utc_offset_minutes: Option<i32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("On Air Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // CLI overrides win over file and environment
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(feed_url) = args.feed_url {
        config.feed_url = Some(feed_url);
    }
    if let Some(minutes) = args.utc_offset_minutes {
        config.utc_offset_minutes = minutes;
    }

    let core_config = config.to_core_config()?;
    log::info!(
        "Configuration: bind_port={}, feed_url={}, utc_offset_minutes={}",
        core_config.preferred_port,
        core_config.feed_url,
        core_config.utc_offset_minutes
    );

    let (port, listener) = bind(core_config.preferred_port)
        .await
        .context("Failed to bind HTTP port")?;

    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;
    log::info!("Services bootstrapped successfully");

    let app_state = AppState::new(&services);
    let shutdown = services.cancel_token.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state, listener, shutdown).await {
            log::error!("Server error: {}", e);
        }
    });

    log::info!("HTTP server started on port {}", port);

    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");

    services.shutdown().await;

    // The server drains on cancellation; don't wait forever on open sockets.
    if tokio::time::timeout(std::time::Duration::from_secs(5), server_handle)
        .await
        .is_err()
    {
        log::warn!("HTTP server did not stop within 5s");
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
