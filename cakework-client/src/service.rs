//! Remote job service abstraction
//!
//! The poller and the watcher only talk to the service through this trait,
//! so they can be driven by the HTTP client or by a test double.

use async_trait::async_trait;
use cakework_core::domain::job::{JobId, JobStatus};
use cakework_core::domain::run::{Run, RunOutput};
use cakework_core::dto::run::RunRequestBody;

use crate::error::Result;

/// Operations exposed by the remote job service
#[async_trait]
pub trait JobService: Send + Sync {
    /// Submits a new run of `task`
    ///
    /// Not idempotent: every call starts an independent job.
    /// Any failure is reported as [`ClientError::Submission`](crate::ClientError::Submission).
    async fn submit(&self, task: &str, request: RunRequestBody) -> Result<JobId>;

    /// Returns the current status of a job
    async fn get_status(&self, job_id: &JobId) -> Result<JobStatus>;

    /// Returns the result payload of a succeeded job
    async fn get_result(&self, job_id: &JobId) -> Result<RunOutput>;

    /// Returns the full run record, including failure diagnostics
    async fn get_run(&self, job_id: &JobId) -> Result<Run>;
}
