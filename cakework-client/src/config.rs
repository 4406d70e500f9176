//! Client configuration
//!
//! Connection settings for the remote job service and the polling policy
//! used while waiting for jobs. Both are plain values handed to
//! constructors; nothing here is process-wide state.

use std::time::Duration;

use crate::error::{ClientError, Result};

/// Connection settings for the job service
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URL (e.g., "https://api.cakework.com")
    pub endpoint: String,

    /// Credential sent as a bearer token on every request
    pub token: String,

    /// Logical job namespace the tasks are registered under
    pub app_name: String,

    /// Timeout applied to each individual HTTP request
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a new configuration with defaults
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        app_name: impl Into<String>,
    ) -> Self {
        let endpoint = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.into(),
            app_name: app_name.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - CAKEWORK_ENDPOINT (required)
    /// - CAKEWORK_TOKEN (required)
    /// - CAKEWORK_APP (required)
    /// - CAKEWORK_REQUEST_TIMEOUT (optional, seconds, default: 30)
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `var`
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |name: &str| {
            var(name).ok_or_else(|| ClientError::Config(format!("{name} environment variable not set")))
        };

        let endpoint = required("CAKEWORK_ENDPOINT")?;
        let token = required("CAKEWORK_TOKEN")?;
        let app_name = required("CAKEWORK_APP")?;

        let request_timeout = match var("CAKEWORK_REQUEST_TIMEOUT") {
            Some(raw) => raw.trim().parse::<u64>().map(Duration::from_secs).map_err(|_| {
                ClientError::Config(format!("invalid CAKEWORK_REQUEST_TIMEOUT: {raw}"))
            })?,
            None => Duration::from_secs(30),
        };

        Ok(Self::new(endpoint, token, app_name).with_request_timeout(request_timeout))
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.is_empty() {
            return Err(ClientError::Config("endpoint cannot be empty".into()));
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ClientError::Config(
                "endpoint must start with http:// or https://".into(),
            ));
        }

        if self.token.trim().is_empty() {
            return Err(ClientError::Config("token cannot be empty".into()));
        }

        if self.app_name.trim().is_empty() {
            return Err(ClientError::Config("app_name cannot be empty".into()));
        }

        if self.request_timeout.is_zero() {
            return Err(ClientError::Config(
                "request_timeout must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

/// Polling policy used while waiting for a job to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Fixed delay between two status polls
    pub poll_interval: Duration,

    /// Total wait budget before giving up with a timeout
    pub timeout: Duration,

    /// Consecutive transient poll failures tolerated before surfacing one
    pub transient_retries: u32,
}

impl PollConfig {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
            transient_retries: 0,
        }
    }

    pub fn with_transient_retries(mut self, retries: u32) -> Self {
        self.transient_retries = retries;
        self
    }

    /// Validates the configuration
    ///
    /// A zero poll interval is allowed (back-to-back polling).
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(ClientError::Config("timeout must be greater than 0".into()));
        }

        Ok(())
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(300))
    }
}
