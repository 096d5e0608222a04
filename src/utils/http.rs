//! HTTP client utilities.

use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults
///
/// Every provider request goes through [`HttpClient::get_json`] or
/// [`HttpClient::get_text`], which map the response status onto the
/// distinctions the retry loop cares about: found, unknown to the provider
/// (`Ok(None)`), rate limited, transient server failure, or permanent error.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_user_agent(&default_user_agent(None))
    }

    /// Create a new HTTP client with a custom user agent
    pub fn with_user_agent(user_agent: &str) -> Result<Self, SourceError> {
        Self::build(user_agent, Duration::from_secs(30), Duration::from_secs(10))
    }

    /// Create a client from the `[http]` configuration section
    pub fn from_config(config: &HttpConfig) -> Result<Self, SourceError> {
        let user_agent = config
            .user_agent
            .clone()
            .unwrap_or_else(|| default_user_agent(config.mailto.as_deref()));
        Self::build(
            &user_agent,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    fn build(
        user_agent: &str,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Create from an existing reqwest Client
    pub fn from_client(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// GET a JSON document. Returns `Ok(None)` when the resource does not exist.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, SourceError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        match classify(response)? {
            Some(response) => {
                let body = response.text().await?;
                let parsed = serde_json::from_str(&body)?;
                Ok(Some(parsed))
            }
            None => Ok(None),
        }
    }

    /// GET a plain-text document. Returns `Ok(None)` when the resource does not exist.
    pub async fn get_text(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<String>, SourceError> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "text/plain")
            .send()
            .await?;

        match classify(response)? {
            Some(response) => Ok(Some(response.text().await?)),
            None => Ok(None),
        }
    }
}

/// Polite-pool user agent, e.g. `who-cited/0.1.0 (mailto:me@example.org)`
pub fn default_user_agent(mailto: Option<&str>) -> String {
    match mailto {
        Some(email) => format!(
            "{}/{} (mailto:{})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            email
        ),
        None => format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
    }
}

fn classify(response: Response) -> Result<Option<Response>, SourceError> {
    let status = response.status();

    if status.is_success() {
        return Ok(Some(response));
    }

    match status {
        StatusCode::NOT_FOUND | StatusCode::GONE => Ok(None),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            Err(SourceError::RateLimit(retry_after))
        }
        StatusCode::REQUEST_TIMEOUT => Err(SourceError::Timeout),
        s if s.is_server_error() => Err(SourceError::Server(s.as_u16())),
        s => Err(SourceError::Api(format!("unexpected status {}", s))),
    }
}
