//! Error types for the Cakework client

use cakework_core::domain::job::{JobId, JobStatus};
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when using the Cakework client
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request could not be built or sent
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an unexpected error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// The service rejected or could not accept a submission
    #[error("Failed to submit task '{task}': {reason}")]
    Submission { task: String, reason: String },

    /// Network-level failure while polling; safe to retry
    #[error("Transient failure for job {job_id}: {reason}")]
    Transient { job_id: JobId, reason: String },

    /// Job id unknown to the service (expired or never existed)
    #[error("Job {job_id} not found")]
    NotFound { job_id: JobId },

    /// Job reached the FAILED terminal state
    #[error("Job {job_id} failed: {}", .detail.as_deref().unwrap_or("no diagnostic provided"))]
    JobFailed {
        job_id: JobId,
        detail: Option<String>,
    },

    /// Wait budget exhausted before a terminal state was observed
    #[error(
        "Timed out waiting for job {job_id} after {polls} poll(s) (last status: {})",
        fmt_status(.last_status)
    )]
    Timeout {
        job_id: JobId,
        last_status: Option<JobStatus>,
        polls: u32,
    },

    /// Caller cancelled the wait
    #[error("Wait for job {job_id} cancelled (last status: {})", fmt_status(.last_status))]
    Cancelled {
        job_id: JobId,
        last_status: Option<JobStatus>,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

fn fmt_status(status: &Option<JobStatus>) -> &'static str {
    status.map_or("unknown", JobStatus::as_str)
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. }) || matches!(self, Self::ApiError { status: 404, .. })
    }

    /// Check if retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 500)
    }

    /// Job the error refers to, if any
    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            Self::Transient { job_id, .. }
            | Self::NotFound { job_id }
            | Self::JobFailed { job_id, .. }
            | Self::Timeout { job_id, .. }
            | Self::Cancelled { job_id, .. } => Some(job_id),
            _ => None,
        }
    }

    /// Reclassifies an error raised while querying an existing job
    ///
    /// 404 becomes [`ClientError::NotFound`]; send failures and 5xx responses
    /// become [`ClientError::Transient`].
    pub(crate) fn for_job(self, job_id: &JobId) -> Self {
        if self.is_server_error() {
            return Self::Transient {
                job_id: job_id.clone(),
                reason: self.to_string(),
            };
        }

        match self {
            Self::ApiError { status: 404, .. } => Self::NotFound {
                job_id: job_id.clone(),
            },
            Self::RequestFailed(e) if !e.is_builder() && !e.is_decode() => Self::Transient {
                job_id: job_id.clone(),
                reason: e.to_string(),
            },
            other => other,
        }
    }

    /// Wraps any failure raised while submitting a task
    pub(crate) fn for_submission(self, task: &str) -> Self {
        match self {
            already @ Self::Submission { .. } => already,
            other => Self::Submission {
                task: task.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_job_classification() {
        let id = JobId::new("r-1");

        let err = ClientError::api_error(404, "missing").for_job(&id);
        assert!(matches!(err, ClientError::NotFound { .. }));
        assert!(err.is_not_found());

        let err = ClientError::api_error(503, "busy").for_job(&id);
        assert!(err.is_retryable());
        assert_eq!(err.job_id(), Some(&id));
        assert!(err.to_string().contains("503"), "{err}");

        let err = ClientError::api_error(499, "client closed").for_job(&id);
        assert!(!err.is_retryable());
        assert!(!err.is_server_error());

        let err = ClientError::api_error(401, "bad token").for_job(&id);
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_submission_wraps_reason() {
        let err = ClientError::api_error(401, "bad token").for_submission("say_hello");
        match err {
            ClientError::Submission { task, reason } => {
                assert_eq!(task, "say_hello");
                assert!(reason.contains("401"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_messages_carry_context() {
        let err = ClientError::Timeout {
            job_id: JobId::new("r-9"),
            last_status: Some(JobStatus::InProgress),
            polls: 3,
        };
        assert_eq!(
            err.to_string(),
            "Timed out waiting for job r-9 after 3 poll(s) (last status: IN_PROGRESS)"
        );

        let err = ClientError::JobFailed {
            job_id: JobId::new("r-9"),
            detail: None,
        };
        assert_eq!(err.to_string(), "Job r-9 failed: no diagnostic provided");
    }
}
