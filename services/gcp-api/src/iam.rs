//! IAM API client
//!
//! Lists service accounts and their keys, one API response page at a time.
//! Page contents are passed through untouched.

use crate::auth::TokenSource;
use crate::base_client::{BaseClient, ClientOptions};
use crate::error::Result;
use futures::{Stream, TryStreamExt};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// One page of service accounts for a project
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceAccountsPage {
    pub project: String,
    pub service_accounts: Value,
}

/// One page of keys for a service account
///
/// Keys returned by the API never contain private key material.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceAccountKeysPage {
    pub project: String,
    pub service_account: String,
    pub keys: Value,
}

/// IAM client
pub struct IamClient {
    base: BaseClient,
}

impl IamClient {
    pub const API_NAME: &'static str = "iam";

    /// Create an IAM client; uses ADC when `credentials` is `None`
    pub fn new(credentials: Option<Arc<dyn TokenSource>>) -> Result<Self> {
        Self::with_options(credentials, ClientOptions::default())
    }

    pub fn with_options(
        credentials: Option<Arc<dyn TokenSource>>,
        options: ClientOptions,
    ) -> Result<Self> {
        Ok(Self {
            base: BaseClient::new(Self::API_NAME, credentials, options)?,
        })
    }

    pub fn base(&self) -> &BaseClient {
        &self.base
    }

    /// List service accounts for a project
    pub fn list_service_accounts(
        &self,
        project_id: &str,
    ) -> impl Stream<Item = Result<ServiceAccountsPage>> + '_ {
        let project = project_id.to_string();
        let request = self
            .base
            .request(Method::GET, format!("projects/{}/serviceAccounts", project_id));

        self.base
            .paginate(request)
            .map_ok(move |response| ServiceAccountsPage {
                project: project.clone(),
                service_accounts: response,
            })
    }

    /// List the keys of one of a project's service accounts
    pub fn list_service_account_keys(
        &self,
        project_id: &str,
        service_account_email: &str,
    ) -> impl Stream<Item = Result<ServiceAccountKeysPage>> + '_ {
        let project = project_id.to_string();
        let service_account = service_account_email.to_string();
        let request = self.base.request(
            Method::GET,
            format!(
                "projects/{}/serviceAccounts/{}/keys",
                project_id, service_account_email
            ),
        );

        self.base
            .paginate(request)
            .map_ok(move |response| ServiceAccountKeysPage {
                project: project.clone(),
                service_account: service_account.clone(),
                keys: response,
            })
    }
}
