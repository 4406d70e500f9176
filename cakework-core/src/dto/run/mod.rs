//! Run DTOs
//!
//! Bodies of the submit, status and result endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobId, JobStatus};
use crate::domain::parameters::Parameters;
use crate::domain::run::{Compute, RunOutput};

/// Request to submit a new run of a task
///
/// The task name and app are part of the request path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRequestBody {
    pub parameters: Parameters,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compute: Option<Compute>,
}

impl RunRequestBody {
    pub fn new(parameters: Parameters) -> Self {
        Self {
            parameters,
            compute: None,
        }
    }

    pub fn with_compute(mut self, compute: Compute) -> Self {
        self.compute = Some(compute);
        self
    }
}

/// Response to a successful submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub run_id: JobId,
}

/// Response of the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: JobStatus,
}

/// Response of the result endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultResponse {
    pub result: RunOutput,
}

/// Query parameters for listing the runs of a task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRunsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
}
