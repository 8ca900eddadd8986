//! Forseti Scanner Daemon
//!
//! Listens on an inventory Pub/Sub subscription for snapshot-ready
//! notifications and triggers the scanner:
//! - when a new snapshot is announced, or
//! - at least once per scan interval, at the top of the hour.

pub mod config;
pub mod daemon;
pub mod scanner;

pub use config::{Args, DaemonConfig};
pub use daemon::{next_scan_time, should_scan, DaemonState, PollOutcome, ScannerDaemon};
pub use scanner::{CommandScanner, Scanner};
