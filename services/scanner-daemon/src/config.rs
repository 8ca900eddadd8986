//! Daemon configuration from command line flags and environment

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::time::Duration;

/// Default number of messages pulled per poll
pub const DEFAULT_MAX_MESSAGES: u32 = 10;

/// Upper bound for `--max-scan-interval`: 366 days
pub const MAX_SCAN_INTERVAL_SECS: u64 = 366 * 24 * 60 * 60;

/// Forseti scanner daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "scanner-daemon", version, about)]
pub struct Args {
    /// Inventory subscription (projects/{project}/subscriptions/{name})
    #[arg(long, env = "FORSETI_SCANNER_SUBSCRIPTION")]
    pub subscription: Option<String>,

    /// PubSub poll interval in seconds
    #[arg(
        long,
        default_value = "10",
        env = "FORSETI_POLL_INTERVAL",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval: u64,

    /// Longest time between scans, in seconds
    #[arg(long, default_value = "3600", env = "FORSETI_MAX_SCAN_INTERVAL")]
    pub max_scan_interval: u64,

    /// Maximum messages to pull per poll
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGES)]
    pub max_messages: u32,

    /// Scanner program to run when a scan is due
    #[arg(long, default_value = "forseti_scanner", env = "FORSETI_SCANNER_COMMAND")]
    pub scanner_command: String,

    /// Extra arguments passed to the scanner program
    #[arg(long = "scanner-arg", allow_hyphen_values = true)]
    pub scanner_args: Vec<String>,

    /// Access token to use instead of Application Default Credentials
    #[arg(long, env = "GCP_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Run a single poll cycle and exit
    #[arg(long, default_value = "false")]
    pub once: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, env = "FORSETI_JSON_LOGS")]
    pub json_logs: bool,
}

/// Settings for the poll loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonConfig {
    pub subscription: String,
    pub poll_interval: Duration,
    pub max_scan_interval: chrono::Duration,
    pub max_messages: u32,
}

impl DaemonConfig {
    pub fn new(subscription: impl Into<String>) -> Self {
        Self {
            subscription: subscription.into(),
            poll_interval: Duration::from_secs(10),
            max_scan_interval: chrono::Duration::hours(1),
            max_messages: DEFAULT_MAX_MESSAGES,
        }
    }
}

impl Args {
    /// Loop settings, or `None` when there is no subscription to listen to
    pub fn daemon_config(&self) -> Result<Option<DaemonConfig>> {
        let Some(subscription) = self.subscription.as_deref().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };

        if self.max_scan_interval > MAX_SCAN_INTERVAL_SECS {
            bail!(
                "--max-scan-interval {} exceeds the maximum of {} seconds",
                self.max_scan_interval,
                MAX_SCAN_INTERVAL_SECS
            );
        }
        let max_scan_interval = i64::try_from(self.max_scan_interval)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .with_context(|| format!("Invalid --max-scan-interval {}", self.max_scan_interval))?;

        Ok(Some(DaemonConfig {
            subscription: subscription.to_string(),
            poll_interval: Duration::from_secs(self.poll_interval),
            max_scan_interval,
            max_messages: self.max_messages,
        }))
    }
}
