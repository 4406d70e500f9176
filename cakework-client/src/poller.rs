//! Job poller
//!
//! Submits units of work and waits for them by polling their status at a
//! fixed interval until a terminal state is reached, the wait budget runs
//! out, or the caller cancels.

use std::sync::Arc;
use std::time::Duration;

use cakework_core::domain::job::{JobId, JobStatus};
use cakework_core::domain::parameters::Parameters;
use cakework_core::domain::run::{Compute, RunOutput};
use cakework_core::dto::run::RunRequestBody;
use cakework_core::task::TaskRequest;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PollConfig;
use crate::error::{ClientError, Result};
use crate::service::JobService;

/// Submits jobs and waits for their completion
#[derive(Clone)]
pub struct JobPoller {
    service: Arc<dyn JobService>,
    config: PollConfig,
}

impl JobPoller {
    /// Creates a new job poller
    pub fn new(service: Arc<dyn JobService>, config: PollConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    // =============================================================================
    // Submission
    // =============================================================================

    /// Submits a run of `task` with untyped parameters
    pub async fn submit(&self, task: &str, parameters: Parameters) -> Result<JobId> {
        self.submit_request(task, RunRequestBody::new(parameters))
            .await
    }

    /// Submits a run of `task` with an explicit compute request
    pub async fn submit_with_compute(
        &self,
        task: &str,
        parameters: Parameters,
        compute: Compute,
    ) -> Result<JobId> {
        self.submit_request(task, RunRequestBody::new(parameters).with_compute(compute))
            .await
    }

    /// Submits a strongly typed task request
    pub async fn submit_task<T: TaskRequest + Sync>(&self, request: &T) -> Result<JobId> {
        let parameters = request
            .to_parameters()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()).for_submission(T::TASK))?;

        self.submit(T::TASK, parameters).await
    }

    async fn submit_request(&self, task: &str, request: RunRequestBody) -> Result<JobId> {
        if task.trim().is_empty() {
            return Err(ClientError::InvalidRequest("task name cannot be empty".into())
                .for_submission(task));
        }

        if let Some(compute) = &request.compute {
            compute
                .validate()
                .map_err(|e| ClientError::InvalidRequest(e).for_submission(task))?;
        }

        let job_id = self
            .service
            .submit(task, request)
            .await
            .map_err(|e| e.for_submission(task))?;

        info!(job_id = %job_id, task, "Job submitted");
        Ok(job_id)
    }

    // =============================================================================
    // Status
    // =============================================================================

    /// Returns the current status of a job
    pub async fn poll_status(&self, job_id: &JobId) -> Result<JobStatus> {
        self.service.get_status(job_id).await
    }

    /// Returns the result payload of a succeeded job
    pub async fn get_result(&self, job_id: &JobId) -> Result<RunOutput> {
        self.service.get_result(job_id).await
    }

    // =============================================================================
    // Waiting
    // =============================================================================

    /// Polls `job_id` every `poll_interval` until it finishes or `timeout`
    /// elapses
    ///
    /// Returns the result payload on success, [`ClientError::JobFailed`] if
    /// the job failed and [`ClientError::Timeout`] if the budget ran out.
    /// The remote job is never cancelled.
    pub async fn await_completion(
        &self,
        job_id: &JobId,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<RunOutput> {
        self.await_completion_with_cancel(job_id, poll_interval, timeout, &CancellationToken::new())
            .await
    }

    /// Same as [`await_completion`](Self::await_completion), returning
    /// [`ClientError::Cancelled`] as soon as `cancel` fires
    pub async fn await_completion_with_cancel(
        &self,
        job_id: &JobId,
        poll_interval: Duration,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<RunOutput> {
        // A budget too large to represent never expires
        let deadline = Instant::now().checked_add(timeout);
        let mut tracker = StatusTracker::new(job_id.clone());
        let mut transient_failures = 0u32;

        debug!(
            job_id = %job_id,
            interval_ms = poll_interval.as_millis() as u64,
            timeout_ms = timeout.as_millis() as u64,
            "Waiting for job"
        );

        loop {
            if cancel.is_cancelled() {
                return Err(tracker.cancelled());
            }

            if tracker.polls > 0 && is_past(deadline) {
                warn!(job_id = %job_id, polls = tracker.polls, "Timed out waiting for job");
                return Err(tracker.timed_out());
            }

            tracker.polls += 1;
            match self.service.get_status(job_id).await {
                Ok(status) => {
                    transient_failures = 0;
                    tracker.observe(status);
                }
                Err(e) if e.is_retryable() && transient_failures < self.config.transient_retries => {
                    transient_failures += 1;
                    warn!(
                        job_id = %job_id,
                        attempt = transient_failures,
                        max = self.config.transient_retries,
                        error = %e,
                        "Transient failure while polling, retrying"
                    );
                }
                Err(e) => return Err(e),
            }

            if let Some(outcome) = resolve_terminal(self.service.as_ref(), &tracker).await {
                return outcome;
            }

            // Wait before the next poll, respecting cancellation.
            let delay = match deadline {
                Some(deadline) => {
                    poll_interval.min(deadline.saturating_duration_since(Instant::now()))
                }
                None => poll_interval,
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(job_id = %job_id, "Wait cancelled");
                    return Err(tracker.cancelled());
                }
                _ = time::sleep(delay) => {}
            }
        }
    }

    /// Waits for `job_id` using the configured interval and timeout
    pub async fn wait(&self, job_id: &JobId, cancel: &CancellationToken) -> Result<RunOutput> {
        self.await_completion_with_cancel(
            job_id,
            self.config.poll_interval,
            self.config.timeout,
            cancel,
        )
        .await
    }

    /// Submits a run and waits for it using the configured policy
    pub async fn submit_and_wait(
        &self,
        task: &str,
        parameters: Parameters,
        cancel: &CancellationToken,
    ) -> Result<RunOutput> {
        let job_id = self.submit(task, parameters).await?;
        self.wait(&job_id, cancel).await
    }
}

/// Whether an optional deadline has been reached
pub(crate) fn is_past(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

/// Last observed status of one job and the number of polls made
#[derive(Debug)]
pub(crate) struct StatusTracker {
    pub(crate) job_id: JobId,
    pub(crate) last_status: Option<JobStatus>,
    pub(crate) polls: u32,
}

impl StatusTracker {
    pub(crate) fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            last_status: None,
            polls: 0,
        }
    }

    /// Records a polled status, ignoring reports that move backwards
    pub(crate) fn observe(&mut self, status: JobStatus) {
        match self.last_status {
            Some(previous) if !previous.accepts(status) => {
                warn!(
                    job_id = %self.job_id,
                    previous = %previous,
                    reported = %status,
                    "Ignoring status regression"
                );
            }
            Some(previous) if previous == status => {
                debug!(job_id = %self.job_id, poll = self.polls, status = %status, "Job status unchanged");
            }
            _ => {
                debug!(job_id = %self.job_id, poll = self.polls, status = %status, "Job status changed");
                self.last_status = Some(status);
            }
        }
    }

    pub(crate) fn timed_out(&self) -> ClientError {
        ClientError::Timeout {
            job_id: self.job_id.clone(),
            last_status: self.last_status,
            polls: self.polls,
        }
    }

    pub(crate) fn cancelled(&self) -> ClientError {
        ClientError::Cancelled {
            job_id: self.job_id.clone(),
            last_status: self.last_status,
        }
    }
}

/// Produces the final outcome once the tracked job is terminal
pub(crate) async fn resolve_terminal(
    service: &dyn JobService,
    tracker: &StatusTracker,
) -> Option<Result<RunOutput>> {
    let job_id = &tracker.job_id;

    match tracker.last_status? {
        JobStatus::Succeeded => {
            let outcome = service.get_result(job_id).await;
            if outcome.is_ok() {
                info!(job_id = %job_id, polls = tracker.polls, "Job succeeded");
            }
            Some(outcome)
        }
        JobStatus::Failed => {
            let detail = match service.get_run(job_id).await {
                Ok(run) => run.error,
                Err(e) => {
                    debug!(job_id = %job_id, error = %e, "Could not fetch failure diagnostic");
                    None
                }
            };
            info!(job_id = %job_id, polls = tracker.polls, "Job failed");
            Some(Err(ClientError::JobFailed {
                job_id: job_id.clone(),
                detail,
            }))
        }
        JobStatus::Pending | JobStatus::InProgress => None,
    }
}
