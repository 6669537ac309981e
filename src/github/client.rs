//! # GitHub Installation Token Client
//!
//! Exchanges an app JWT for an installation access token.
//!
//! One HTTP call per exchange and no internal retry: scheduling retries is
//! the reconciler's job.

use crate::crd::TokenScope;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Installation access token returned by GitHub
#[derive(Clone, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub permissions: BTreeMap<String, String>,
    #[serde(default)]
    pub repository_selection: Option<String>,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("permissions", &self.permissions)
            .field("repository_selection", &self.repository_selection)
            .field("repositories", &self.repositories)
            .finish()
    }
}

/// Repository the token grants access to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("error sending request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("error reading response body: {0}")]
    ReadBody(#[source] reqwest::Error),

    #[error("unexpected status code: {status}, body: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("error unmarshaling response: {0}")]
    MalformedBody(#[source] serde_json::Error),
}

/// Exchanges an app assertion for an installation access token
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn create_installation_access_token(
        &self,
        installation_id: &str,
        assertion: &str,
        scope: Option<&TokenScope>,
    ) -> Result<AccessToken, ExchangeError>;
}

/// Request body narrowing the token, in GitHub's field names
#[derive(Debug, Serialize)]
struct ScopeBody<'a> {
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    repositories: &'a [String],
    #[serde(skip_serializing_if = "<[i64]>::is_empty")]
    repository_ids: &'a [i64],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    permissions: &'a BTreeMap<String, String>,
}

impl<'a> From<&'a TokenScope> for ScopeBody<'a> {
    fn from(scope: &'a TokenScope) -> Self {
        Self {
            repositories: &scope.repositories,
            repository_ids: &scope.repository_ids,
            permissions: &scope.permissions,
        }
    }
}

/// [`TokenExchanger`] over the GitHub REST API
#[derive(Debug, Clone)]
pub struct GitHubClient {
    base_url: String,
    http: reqwest::Client,
}

impl GitHubClient {
    /// Create a client for the given API base URL (e.g. `https://api.github.com`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TokenExchanger for GitHubClient {
    async fn create_installation_access_token(
        &self,
        installation_id: &str,
        assertion: &str,
        scope: Option<&TokenScope>,
    ) -> Result<AccessToken, ExchangeError> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.base_url, installation_id
        );
        debug!("Requesting installation access token from {}", url);

        let mut request = self
            .http
            .post(&url)
            .bearer_auth(assertion)
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(USER_AGENT, crate::constants::CONTROLLER_NAME);
        if let Some(scope) = scope.filter(|s| !s.is_empty()) {
            request = request.json(&ScopeBody::from(scope));
        }

        let response = request.send().await.map_err(ExchangeError::Transport)?;
        let status = response.status();
        let body = response.text().await.map_err(ExchangeError::ReadBody)?;

        if status != StatusCode::CREATED {
            return Err(ExchangeError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(ExchangeError::MalformedBody)
    }
}
