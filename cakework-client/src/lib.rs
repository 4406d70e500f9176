//! Cakework HTTP Client
//!
//! A type-safe client for submitting runs to the Cakework job service and
//! waiting for them to finish.
//!
//! - [`CakeworkClient`] talks to the service over HTTP.
//! - [`JobPoller`] submits a job and polls it until a terminal state.
//! - [`JobWatcher`] multiplexes many pending jobs onto one polling loop.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use cakework_client::{CakeworkClient, ClientConfig, JobPoller, PollConfig};
//! use cakework_core::task::SayHello;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::new("http://localhost:8080", "token", "react-example-backend");
//!     let client = CakeworkClient::new(config)?;
//!     let poller = JobPoller::new(Arc::new(client), PollConfig::default());
//!
//!     let job_id = poller.submit_task(&SayHello { name: "jessie".into() }).await?;
//!     let output = poller
//!         .await_completion(&job_id, Duration::from_secs(1), Duration::from_secs(60))
//!         .await?;
//!
//!     println!("{}", output);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod poller;
mod runs;
pub mod service;
pub mod watcher;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{ClientConfig, PollConfig};
pub use error::{ClientError, Result};
pub use poller::JobPoller;
pub use service::JobService;
pub use tokio_util::sync::CancellationToken;
pub use watcher::{JobWatcher, WatchHandle};

use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;

/// HTTP client for the Cakework job service
///
/// Cloning is cheap; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct CakeworkClient {
    /// Parsed service base URL
    base_url: Url,
    /// Connection settings
    config: ClientConfig,
    /// HTTP client instance
    client: Client,
}

impl CakeworkClient {
    /// Create a new client
    ///
    /// Validates the configuration and builds an HTTP client applying
    /// `config.request_timeout` to every request.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {e}")))?;

        Self::with_client(config, client)
    }

    /// Create a new client with a custom HTTP client
    ///
    /// This allows you to configure proxies, TLS settings, etc. The
    /// `request_timeout` of `config` is not applied to `client`.
    pub fn with_client(config: ClientConfig, client: Client) -> Result<Self> {
        config.validate()?;

        let base_url = Url::parse(&config.endpoint)
            .map_err(|e| ClientError::Config(format!("Invalid endpoint '{}': {e}", config.endpoint)))?;

        Ok(Self {
            base_url,
            config,
            client,
        })
    }

    /// Get the base URL of the service
    pub fn base_url(&self) -> &str {
        &self.config.endpoint
    }

    /// Get the app name runs are submitted under
    pub fn app_name(&self) -> &str {
        &self.config.app_name
    }

    /// Builds an endpoint URL, percent-encoding each path segment
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("Endpoint '{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Attaches the credential to a request
    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(&self.config.token)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
