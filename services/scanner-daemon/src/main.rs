//! Forseti Scanner Daemon
//!
//! Polls the inventory subscription and runs the scanner when a new
//! snapshot arrives or the scan interval elapses.
//!
//! # Usage
//! ```bash
//! scanner-daemon \
//!   --subscription projects/my-project/subscriptions/inventory-snapshots \
//!   --poll-interval 10 \
//!   --scanner-command forseti_scanner
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use forseti_gcp::{PubSubClient, StaticToken, TokenSource};
use forseti_scanner_daemon::{Args, CommandScanner, DaemonState, ScannerDaemon};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG takes precedence over --verbose
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }

    let Some(config) = args.daemon_config()? else {
        info!("No PubSub subscription to listen to. Exiting.");
        return Ok(());
    };

    let credentials = args
        .access_token
        .clone()
        .map(|token| Arc::new(StaticToken::new(token)) as Arc<dyn TokenSource>);
    let pubsub = PubSubClient::new(credentials).context("Failed to build Pub/Sub client")?;

    let scanner =
        CommandScanner::new(args.scanner_command.clone()).args(args.scanner_args.clone());

    let daemon = ScannerDaemon::new(pubsub, scanner, config);

    if args.once {
        let mut state = DaemonState::new(Utc::now(), daemon.config().max_scan_interval);
        let outcome = daemon.poll_once(&mut state, Utc::now()).await?;
        info!(outcome = ?outcome, "Single poll cycle complete");
    } else {
        daemon.run(shutdown_signal()).await;
    }

    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
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
