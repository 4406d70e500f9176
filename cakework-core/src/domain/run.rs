//! Run domain types

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::job::{JobId, JobStatus};
use super::parameters::Parameters;

/// Default CPU count applied by the service when a run does not request one
pub const DEFAULT_CPU: u32 = 1;

/// Default memory (MB) applied by the service when a run does not request one
pub const DEFAULT_MEMORY_MB: u32 = 256;

/// Full record of a run as kept by the remote service
///
/// Only ever read by the client; the service owns the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    #[serde(rename = "runId")]
    pub id: JobId,
    pub task: String,
    pub status: JobStatus,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default)]
    pub result: Option<String>,
    /// Diagnostic text reported by the service for failed runs
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub compute: Option<Compute>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Run {
    /// Result payload, only readable once the run has succeeded
    pub fn output(&self) -> Option<RunOutput> {
        match self.status {
            JobStatus::Succeeded => self.result.clone().map(RunOutput::new),
            _ => None,
        }
    }
}

/// Resources requested for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compute {
    /// Number of CPUs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    /// Memory in MB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<u32>,
}

impl Compute {
    pub fn new(cpu: Option<u32>, memory: Option<u32>) -> Self {
        Self { cpu, memory }
    }

    /// CPU count the service will actually use
    pub fn effective_cpu(&self) -> u32 {
        self.cpu.unwrap_or(DEFAULT_CPU)
    }

    /// Memory (MB) the service will actually use
    pub fn effective_memory(&self) -> u32 {
        self.memory.unwrap_or(DEFAULT_MEMORY_MB)
    }

    /// Rejects explicit zero values
    pub fn validate(&self) -> Result<(), String> {
        if self.cpu == Some(0) {
            return Err("cpu must be greater than 0".to_string());
        }
        if self.memory == Some(0) {
            return Err("memory must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Result payload of a succeeded run
///
/// The service returns JSON text; it is kept verbatim and decoded on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunOutput(String);

impl RunOutput {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw payload text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Decodes the payload as JSON into `T`
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.0)
    }

    /// Decodes the payload as a JSON value, falling back to a plain string
    /// for payloads that are not JSON documents.
    pub fn to_value(&self) -> serde_json::Value {
        self.json()
            .unwrap_or_else(|_| serde_json::Value::String(self.0.clone()))
    }
}

impl std::fmt::Display for RunOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
