//! Scanner daemon poll loop
//!
//! Every poll interval the daemon drains snapshot notifications from the
//! inventory subscription and decides whether a scan is due:
//! - the scheduled scan time has passed, or
//! - a notification named a snapshot different from the previous poll.

use crate::config::DaemonConfig;
use crate::scanner::Scanner;
use anyhow::{Context, Result};
use chrono::{DateTime, DurationRound, Utc};
use forseti_gcp::PubSubClient;
use std::future::Future;
use tracing::{error, info, warn};

/// Next scheduled scan: `now` rounded down to the hour, plus `interval`
///
/// Saturates at the latest representable time.
pub fn next_scan_time(now: DateTime<Utc>, interval: chrono::Duration) -> DateTime<Utc> {
    let top_of_hour = now
        .duration_trunc(chrono::Duration::hours(1))
        .unwrap_or(now);
    top_of_hour
        .checked_add_signed(interval)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Whether a scan should run on this poll
pub fn should_scan(
    now: DateTime<Utc>,
    next_scan: DateTime<Utc>,
    current_snapshot: Option<&str>,
    previous_snapshot: Option<&str>,
) -> bool {
    now > next_scan || (current_snapshot.is_some() && current_snapshot != previous_snapshot)
}

/// State carried between polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonState {
    /// Snapshot seen on the previous poll, if any
    pub previous_snapshot: Option<String>,
    /// When the next scan is due regardless of notifications
    pub next_scan: DateTime<Utc>,
}

impl DaemonState {
    pub fn new(now: DateTime<Utc>, interval: chrono::Duration) -> Self {
        Self {
            previous_snapshot: None,
            next_scan: next_scan_time(now, interval),
        }
    }
}

/// What a single poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// No scan was due
    Skipped,
    /// The scanner ran and succeeded
    Scanned,
    /// The scanner ran and failed
    ScanFailed,
}

/// Polls a subscription and triggers the scanner
pub struct ScannerDaemon<S> {
    pubsub: PubSubClient,
    scanner: S,
    config: DaemonConfig,
}

impl<S: Scanner> ScannerDaemon<S> {
    pub fn new(pubsub: PubSubClient, scanner: S, config: DaemonConfig) -> Self {
        Self {
            pubsub,
            scanner,
            config,
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    /// Drain pending snapshot notifications
    ///
    /// Every pulled message is acknowledged. When several arrive at once the
    /// last one wins. Returns the snapshot timestamp, if any message carried one.
    pub async fn check_subscription(&self) -> Result<Option<String>> {
        let subscription = &self.config.subscription;

        let response = self
            .pubsub
            .pull(subscription, self.config.max_messages, true)
            .await
            .context("Failed to pull from subscription")?;

        let mut ack_ids = Vec::with_capacity(response.received_messages.len());
        let mut snapshot = None;

        for received in response.received_messages {
            ack_ids.push(received.ack_id);

            match received.message.decoded_data() {
                Ok(data) => {
                    let timestamp = String::from_utf8_lossy(&data).trim().to_string();
                    info!(
                        message_id = ?received.message.message_id,
                        data = %timestamp,
                        "Received snapshot notification"
                    );
                    if !timestamp.is_empty() {
                        snapshot = Some(timestamp);
                    }
                }
                Err(e) => {
                    warn!(
                        message_id = ?received.message.message_id,
                        error = %e,
                        "Ignoring undecodable notification"
                    );
                }
            }
        }

        self.pubsub
            .acknowledge(subscription, &ack_ids)
            .await
            .context("Failed to acknowledge messages")?;

        Ok(snapshot)
    }

    /// Run one iteration of the loop at time `now`
    ///
    /// A pull or acknowledge failure leaves `state` untouched.
    pub async fn poll_once(&self, state: &mut DaemonState, now: DateTime<Utc>) -> Result<PollOutcome> {
        info!(now = %now, next_scan = %state.next_scan, "Polling for snapshots");

        let current = self.check_subscription().await?;
        info!(current_snapshot = ?current, "Checked subscription");

        let outcome = if should_scan(
            now,
            state.next_scan,
            current.as_deref(),
            state.previous_snapshot.as_deref(),
        ) {
            let outcome = match self.scanner.run(current.as_deref()).await {
                Ok(()) => PollOutcome::Scanned,
                Err(e) => {
                    error!(error = %format!("{:#}", e), snapshot = ?current, "Scanner run failed");
                    PollOutcome::ScanFailed
                }
            };
            state.next_scan = next_scan_time(Utc::now().max(now), self.config.max_scan_interval);
            info!(next_scan = %state.next_scan, "Scheduled next scan");
            outcome
        } else {
            PollOutcome::Skipped
        };

        state.previous_snapshot = current;
        Ok(outcome)
    }

    /// Poll until `shutdown` resolves
    ///
    /// Failed polls are logged and retried on the next interval.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            subscription = %self.config.subscription,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "Starting scanner daemon"
        );

        let mut state = DaemonState::new(Utc::now(), self.config.max_scan_interval);
        tokio::pin!(shutdown);

        loop {
            if let Err(e) = self.poll_once(&mut state, Utc::now()).await {
                error!(error = %format!("{:#}", e), "Poll cycle failed");
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping scanner daemon");
                    return;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn test_next_scan_time_rounds_to_top_of_hour() {
        let hour = chrono::Duration::hours(1);
        assert_eq!(next_scan_time(at(12, 34, 56), hour), at(13, 0, 0));
        assert_eq!(next_scan_time(at(12, 0, 0), hour), at(13, 0, 0));
        assert_eq!(
            next_scan_time(at(23, 59, 59), hour),
            Utc.with_ymd_and_hms(2017, 6, 2, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_scan_time_saturates() {
        let huge = chrono::Duration::try_seconds(100_000_000_000_000).unwrap();
        assert_eq!(next_scan_time(at(12, 0, 0), huge), DateTime::<Utc>::MAX_UTC);

        let state = DaemonState::new(Utc::now(), huge);
        assert_eq!(state.next_scan, DateTime::<Utc>::MAX_UTC);
        assert!(!should_scan(Utc::now(), state.next_scan, None, None));
    }

    #[test]
    fn test_should_scan_when_overdue() {
        assert!(should_scan(at(13, 0, 1), at(13, 0, 0), None, None));
        assert!(!should_scan(at(13, 0, 0), at(13, 0, 0), None, None));
    }

    #[test]
    fn test_should_scan_on_new_snapshot() {
        let next = at(13, 0, 0);
        let now = at(12, 30, 0);

        assert!(should_scan(now, next, Some("s2"), Some("s1")));
        assert!(should_scan(now, next, Some("s1"), None));
        assert!(!should_scan(now, next, Some("s1"), Some("s1")));
        assert!(!should_scan(now, next, None, Some("s1")));
    }

    #[test]
    fn test_initial_state() {
        let state = DaemonState::new(at(12, 15, 0), chrono::Duration::hours(1));
        assert_eq!(state.next_scan, at(13, 0, 0));
        assert!(state.previous_snapshot.is_none());
    }
}
