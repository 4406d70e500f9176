//! Configuration module
//!
//! Turns the global CLI options into a client for the job service.

use anyhow::{Context, Result};
use cakework_client::{CakeworkClient, ClientConfig};
use tracing::debug;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the job service
    pub endpoint: String,

    /// Bearer token for the job service
    pub token: String,

    /// App the tasks are registered under
    pub app: String,
}

impl Config {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.endpoint, &self.token, &self.app)
    }

    /// Builds a client, validating the connection settings first
    pub fn client(&self) -> Result<CakeworkClient> {
        debug!(endpoint = %self.endpoint, app = %self.app, "Connecting to job service");
        CakeworkClient::new(self.client_config())
            .with_context(|| format!("Invalid client configuration for {}", self.endpoint))
    }
}
