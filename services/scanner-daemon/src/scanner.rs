//! Scanner entry point
//!
//! The scanner itself lives outside this crate. The daemon only needs to
//! start a scan, optionally pinned to a snapshot timestamp.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};

/// Something that can run a scan
#[async_trait]
pub trait Scanner: Send + Sync {
    /// Run a scan against the given snapshot, or the latest one when `None`
    async fn run(&self, snapshot_timestamp: Option<&str>) -> Result<()>;
}

/// Runs an external scanner program
///
/// The snapshot is passed as `--snapshot-timestamp <ts>` after any
/// configured arguments.
#[derive(Debug, Clone)]
pub struct CommandScanner {
    program: String,
    args: Vec<String>,
}

impl CommandScanner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Full argument list for one run
    pub fn command_args(&self, snapshot_timestamp: Option<&str>) -> Vec<String> {
        let mut args = self.args.clone();
        if let Some(ts) = snapshot_timestamp {
            args.push("--snapshot-timestamp".to_string());
            args.push(ts.to_string());
        }
        args
    }
}

#[async_trait]
impl Scanner for CommandScanner {
    async fn run(&self, snapshot_timestamp: Option<&str>) -> Result<()> {
        let args = self.command_args(snapshot_timestamp);
        info!(
            program = %self.program,
            snapshot = ?snapshot_timestamp,
            "Running scanner"
        );

        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .with_context(|| format!("Failed to start scanner '{}'", self.program))?;

        debug!(
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "Scanner output"
        );

        if !output.status.success() {
            bail!(
                "Scanner exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!(program = %self.program, "Scanner finished");
        Ok(())
    }
}
