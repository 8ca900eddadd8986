//! IAM inventory tool
//!
//! Lists a project's service accounts, or the keys of one service account,
//! printing every API response page as one JSON line.
//!
//! # Usage
//! ```bash
//! # List service accounts
//! gcp-iam --project my-project service-accounts
//!
//! # List keys of a service account
//! gcp-iam --project my-project keys --email scanner@my-project.iam.gserviceaccount.com
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use forseti_gcp::{IamClient, StaticToken, TokenSource};
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "gcp-iam")]
#[command(about = "List GCP service accounts and keys", long_about = None)]
#[command(version)]
struct Cli {
    /// GCP project ID
    #[arg(long, env = "GCP_PROJECT_ID")]
    project: String,

    /// Access token to use instead of Application Default Credentials
    #[arg(long, env = "GCP_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List service accounts in the project
    ServiceAccounts,

    /// List keys of a service account
    Keys {
        /// Service account email
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let credentials = cli
        .access_token
        .map(|token| Arc::new(StaticToken::new(token)) as Arc<dyn TokenSource>);
    let iam = IamClient::new(credentials).context("Failed to build IAM client")?;

    match cli.command {
        Commands::ServiceAccounts => {
            info!(project = %cli.project, "Listing service accounts");
            let mut pages = Box::pin(iam.list_service_accounts(&cli.project));
            let mut count = 0;
            while let Some(page) = pages
                .try_next()
                .await
                .context("Failed to list service accounts")?
            {
                println!("{}", serde_json::to_string(&page)?);
                count += 1;
            }
            info!(pages = count, "Listed service accounts");
        }

        Commands::Keys { email } => {
            info!(project = %cli.project, service_account = %email, "Listing service account keys");
            let mut pages = Box::pin(iam.list_service_account_keys(&cli.project, &email));
            let mut count = 0;
            while let Some(page) = pages
                .try_next()
                .await
                .context("Failed to list service account keys")?
            {
                println!("{}", serde_json::to_string(&page)?);
                count += 1;
            }
            info!(pages = count, "Listed service account keys");
        }
    }

    Ok(())
}
