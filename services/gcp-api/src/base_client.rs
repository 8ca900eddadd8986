//! Base client for a Google REST API
//!
//! A `BaseClient` is a service handle for one API name/version. It resolves
//! the service endpoint from the supported API table, attaches credentials,
//! and executes requests with exponential backoff.

use crate::auth::{ApplicationDefaultCredentials, TokenSource};
use crate::error::{GcpApiError, Result};
use crate::retry::{retry, RetryPolicy};
use crate::supported_apis;
use futures::stream::{self, Stream};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Options for building a `BaseClient`
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// API version; defaults to the supported version
    pub version: Option<String>,
    /// Override for the service root URL (emulators, tests)
    pub root_url: Option<String>,
    /// Retry policy for `execute`
    pub retry: RetryPolicy,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            version: None,
            root_url: None,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(60),
        }
    }
}

impl ClientOptions {
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn root_url(mut self, root_url: impl Into<String>) -> Self {
        self.root_url = Some(root_url.into());
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// A single REST call against an API, relative to its service path
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// Set a query parameter, replacing any previous value
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.query.retain(|(k, _)| *k != key);
        self.query.push((key, value.into()));
        self
    }

    /// Set the JSON request body
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Request for the page after `response`, if the API reported one
    pub fn next_page(&self, response: &Value) -> Option<ApiRequest> {
        let token = response.get("nextPageToken")?.as_str()?;
        if token.is_empty() {
            return None;
        }
        Some(self.clone().query("pageToken", token))
    }
}

/// Base client for a specified Google API and credentials
pub struct BaseClient {
    name: String,
    version: String,
    service_url: String,
    http_client: reqwest::Client,
    credentials: Arc<dyn TokenSource>,
    retry: RetryPolicy,
}

impl BaseClient {
    /// Build a service handle for `api_name`
    ///
    /// Falls back to Application Default Credentials when `credentials` is
    /// `None`. APIs and versions outside the supported table are allowed
    /// but logged.
    pub fn new(
        api_name: &str,
        credentials: Option<Arc<dyn TokenSource>>,
        options: ClientOptions,
    ) -> Result<Self> {
        let supported = supported_apis::lookup(api_name);
        if supported.is_none() {
            warn!(
                api = %api_name,
                "API is not formally supported in Forseti, proceed at your own risk"
            );
        }

        let version = match (&options.version, supported) {
            (Some(v), _) => v.clone(),
            (None, Some(api)) => api.version.to_string(),
            (None, None) => {
                return Err(GcpApiError::InvalidRequest(format!(
                    "No version given for unsupported API '{}'",
                    api_name
                )))
            }
        };

        if let Some(api) = supported {
            if api.version != version {
                warn!(
                    api = %api_name,
                    version = %version,
                    supported_version = %api.version,
                    "API version is not formally supported in Forseti, proceed at your own risk"
                );
            }
        }

        let root_url = match (&options.root_url, supported) {
            (Some(url), _) => url.clone(),
            (None, Some(api)) => api.root_url.to_string(),
            (None, None) => format!("https://{}.googleapis.com/", api_name),
        };
        let service_path = match supported {
            Some(api) => api.service_path_for(&version),
            None => format!("{}/", version),
        };
        let service_url = format!("{}/{}", root_url.trim_end_matches('/'), service_path);

        let credentials = match credentials {
            Some(c) => c,
            None => Arc::new(ApplicationDefaultCredentials::new()?),
        };

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("forseti-gcp/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .build()?;

        debug!(api = %api_name, version = %version, url = %service_url, "Built API client");

        Ok(Self {
            name: api_name.to_string(),
            version,
            service_url,
            http_client,
            credentials,
            retry: options.retry,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Root URL plus service path, with trailing slash
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Start a request relative to the service path
    pub fn request(&self, method: Method, path: impl Into<String>) -> ApiRequest {
        ApiRequest::new(method, path)
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.service_url, path.trim_start_matches('/'))
    }

    /// Execute a request with exponential retry
    ///
    /// Once the retry budget is spent the last error is returned as-is and
    /// should be handled upstream.
    pub async fn execute<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        retry(&self.retry, || self.send_once(request)).await
    }

    async fn send_once<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let token = self.credentials.access_token().await?;
        let url = self.url_for(&request.path);

        debug!(api = %self.name, method = %request.method, url = %url, "Executing API request");

        let mut builder = self
            .http_client
            .request(request.method.clone(), &url)
            .bearer_auth(&token);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(GcpApiError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        // Some methods (e.g. acknowledge) answer with an empty body
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Stream every page of a paginated list call
    pub fn paginate(&self, first: ApiRequest) -> impl Stream<Item = Result<Value>> + '_ {
        stream::try_unfold(Some(first), move |next| async move {
            let Some(request) = next else {
                return Ok::<_, GcpApiError>(None);
            };
            let response: Value = self.execute(&request).await?;
            let following = request.next_page(&response);
            Ok(Some((response, following)))
        })
    }
}

impl fmt::Display for BaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API: name={}, version={}", self.name, self.version)
    }
}

impl fmt::Debug for BaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseClient")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("service_url", &self.service_url)
            .finish()
    }
}
