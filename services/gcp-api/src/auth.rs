//! Google API access tokens
//!
//! Authentication is resolved the same way GCP workloads already do it:
//! - GKE / Cloud Run / GCE: the metadata server (Workload Identity)
//! - Local: `gcloud auth application-default print-access-token`
//! - CI or tests: a fixed token passed in explicitly

use crate::error::{GcpApiError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// GCE metadata server token endpoint
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they actually expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// The gcloud CLI does not report expiry, so its tokens are reused for this long
const CLI_TOKEN_TTL: Duration = Duration::from_secs(300);

/// Source of OAuth2 bearer tokens for Google APIs
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid access token
    async fn access_token(&self) -> Result<String>;
}

/// A fixed access token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String> {
        if self.0.is_empty() {
            return Err(GcpApiError::Auth("Empty access token".to_string()));
        }
        Ok(self.0.clone())
    }
}

/// Response from the metadata server token endpoint
#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + EXPIRY_MARGIN < self.expires_at
    }
}

/// Application Default Credentials
///
/// Tries the metadata server first, then falls back to the gcloud CLI.
/// Tokens are cached until shortly before they expire.
pub struct ApplicationDefaultCredentials {
    http_client: reqwest::Client,
    metadata_url: String,
    cache: RwLock<Option<CachedToken>>,
}

impl ApplicationDefaultCredentials {
    /// Create ADC credentials using the standard metadata server address
    pub fn new() -> Result<Self> {
        Self::with_metadata_url(METADATA_TOKEN_URL)
    }

    /// Create ADC credentials against a custom metadata token endpoint
    pub fn with_metadata_url(metadata_url: impl Into<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http_client,
            metadata_url: metadata_url.into(),
            cache: RwLock::new(None),
        })
    }

    async fn fetch_from_metadata(&self) -> Result<CachedToken> {
        let response = self
            .http_client
            .get(&self.metadata_url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GcpApiError::Auth(format!(
                "Metadata server returned status {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| GcpApiError::Auth(format!("Invalid token response: {}", e)))?;

        Ok(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    async fn fetch_from_gcloud(&self) -> Result<CachedToken> {
        let output = tokio::process::Command::new("gcloud")
            .args(["auth", "application-default", "print-access-token"])
            .output()
            .await
            .map_err(|e| GcpApiError::Auth(format!("gcloud CLI not available: {}", e)))?;

        if !output.status.success() {
            return Err(GcpApiError::Auth(format!(
                "gcloud auth failed - run 'gcloud auth application-default login': {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(GcpApiError::Auth("gcloud returned an empty token".to_string()));
        }

        Ok(CachedToken {
            token,
            expires_at: Instant::now() + CLI_TOKEN_TTL,
        })
    }
}

#[async_trait]
impl TokenSource for ApplicationDefaultCredentials {
    async fn access_token(&self) -> Result<String> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.token.clone());
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if cached.is_fresh() {
                return Ok(cached.token.clone());
            }
        }

        let fresh = match self.fetch_from_metadata().await {
            Ok(token) => {
                info!("Using GCP credentials from metadata server");
                token
            }
            Err(e) => {
                debug!(error = %e, "Metadata server not available, falling back to gcloud CLI");
                self.fetch_from_gcloud().await?
            }
        };

        let token = fresh.token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_static_token() {
        let source = StaticToken::new("ya29.test");
        assert_eq!(source.access_token().await.unwrap(), "ya29.test");
    }

    #[tokio::test]
    async fn test_empty_static_token_is_rejected() {
        let source = StaticToken::new("");
        assert!(matches!(
            source.access_token().await,
            Err(GcpApiError::Auth(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/token"))
            .and(header("Metadata-Flavor", "Google"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "ya29.metadata",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let adc =
            ApplicationDefaultCredentials::with_metadata_url(format!("{}/token", server.uri()))
                .unwrap();

        assert_eq!(adc.access_token().await.unwrap(), "ya29.metadata");
        assert_eq!(adc.access_token().await.unwrap(), "ya29.metadata");
    }

    #[test]
    fn test_cached_token_freshness() {
        let expiring = CachedToken {
            token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(10),
        };
        assert!(!expiring.is_fresh());

        let valid = CachedToken {
            token: "t".to_string(),
            expires_at: Instant::now() + Duration::from_secs(3600),
        };
        assert!(valid.is_fresh());
    }
}
