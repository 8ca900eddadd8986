//! Forseti GCP API Library
//!
//! Thin, retrying REST clients for the Google Cloud APIs Forseti relies on.
//!
//! ## Modules
//!
//! - `base_client`: Service handle built from an API name/version, request
//!   execution with exponential backoff, page streaming
//! - `iam`: Service account and service account key listing
//! - `pubsub`: Subscription pull/acknowledge and topic publish
//! - `auth`: Access tokens via ADC (metadata server, `gcloud` CLI) or a fixed token
//!
//! ## Example Usage
//!
//! ```ignore
//! use forseti_gcp::IamClient;
//! use futures::TryStreamExt;
//!
//! let iam = IamClient::new(None)?;
//! let pages: Vec<_> = iam.list_service_accounts("my-project").try_collect().await?;
//! ```

pub mod auth;
pub mod base_client;
pub mod error;
pub mod iam;
pub mod pubsub;
pub mod retry;
pub mod supported_apis;

pub use auth::{ApplicationDefaultCredentials, StaticToken, TokenSource};
pub use base_client::{ApiRequest, BaseClient, ClientOptions};
pub use error::{GcpApiError, Result};
pub use iam::IamClient;
pub use pubsub::PubSubClient;
pub use retry::RetryPolicy;
