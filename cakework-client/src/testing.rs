//! Scripted in-memory job service for tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use cakework_core::domain::job::{JobId, JobStatus};
use cakework_core::domain::parameters::Parameters;
use cakework_core::domain::run::{Run, RunOutput};
use cakework_core::dto::run::RunRequestBody;
use chrono::Utc;

use crate::error::{ClientError, Result};
use crate::service::JobService;

/// Behaviour of one scripted job
#[derive(Debug, Clone, Default)]
pub struct Script {
    /// Statuses returned by successive polls; the last one repeats
    pub statuses: Vec<JobStatus>,
    pub result: Option<String>,
    pub error: Option<String>,
    /// Number of polls that fail transiently before the script starts
    pub transient_failures: u32,
    /// Status requests never answer
    pub stalled: bool,
}

impl Script {
    pub fn new(statuses: &[JobStatus]) -> Self {
        Self {
            statuses: statuses.to_vec(),
            ..Default::default()
        }
    }

    pub fn with_result(mut self, result: &str) -> Self {
        self.result = Some(result.to_string());
        self
    }

    pub fn with_error(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn with_transient_failures(mut self, count: u32) -> Self {
        self.transient_failures = count;
        self
    }

    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }
}

#[derive(Debug)]
struct ScriptedJob {
    task: String,
    parameters: Parameters,
    statuses: VecDeque<JobStatus>,
    current: JobStatus,
    result: Option<String>,
    error: Option<String>,
    transient_failures: u32,
    stalled: bool,
    polls: u32,
}

#[derive(Debug, Default)]
struct State {
    jobs: HashMap<JobId, ScriptedJob>,
    next_scripts: VecDeque<Script>,
    submitted: Vec<(String, RunRequestBody)>,
    reject_submissions: Option<String>,
    next_id: u32,
}

/// Job service whose jobs follow pre-recorded status sequences
#[derive(Debug, Default)]
pub struct ScriptedService {
    state: Mutex<State>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next submitted job follows `script`
    pub fn on_submit(&self, script: Script) {
        self.state.lock().unwrap().next_scripts.push_back(script);
    }

    /// Registers a job that already exists remotely
    pub fn add_job(&self, job_id: &str, script: Script) -> JobId {
        let id = JobId::new(job_id);
        let job = ScriptedJob::new("existing", Parameters::new(), script);
        self.state.lock().unwrap().jobs.insert(id.clone(), job);
        id
    }

    /// Every submission fails with `reason`
    pub fn reject_submissions(&self, reason: &str) {
        self.state.lock().unwrap().reject_submissions = Some(reason.to_string());
    }

    /// Number of status polls received for `job_id`
    pub fn polls(&self, job_id: &JobId) -> u32 {
        self.state
            .lock()
            .unwrap()
            .jobs
            .get(job_id)
            .map_or(0, |job| job.polls)
    }

    /// Submissions received so far
    pub fn submitted(&self) -> Vec<(String, RunRequestBody)> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Answers one status poll, or `None` when the job never answers
    fn next_status(&self, job_id: &JobId) -> Option<Result<JobStatus>> {
        let mut state = self.state.lock().unwrap();
        let Some(job) = state.jobs.get_mut(job_id) else {
            return Some(Err(ClientError::NotFound {
                job_id: job_id.clone(),
            }));
        };

        job.polls += 1;
        if job.stalled {
            return None;
        }

        if job.transient_failures > 0 {
            job.transient_failures -= 1;
            return Some(Err(ClientError::Transient {
                job_id: job_id.clone(),
                reason: "connection reset".to_string(),
            }));
        }

        Some(Ok(job.advance()))
    }
}

impl ScriptedJob {
    fn new(task: &str, parameters: Parameters, script: Script) -> Self {
        let mut statuses: VecDeque<_> = script.statuses.into();
        if statuses.is_empty() {
            statuses.push_back(JobStatus::Pending);
        }
        Self {
            task: task.to_string(),
            parameters,
            current: JobStatus::Pending,
            statuses,
            result: script.result,
            error: script.error,
            transient_failures: script.transient_failures,
            stalled: script.stalled,
            polls: 0,
        }
    }

    fn advance(&mut self) -> JobStatus {
        self.current = if self.statuses.len() > 1 {
            self.statuses.pop_front().unwrap_or(self.current)
        } else {
            self.statuses.front().copied().unwrap_or(self.current)
        };
        self.current
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn submit(&self, task: &str, request: RunRequestBody) -> Result<JobId> {
        let mut state = self.state.lock().unwrap();

        if let Some(reason) = &state.reject_submissions {
            return Err(ClientError::Submission {
                task: task.to_string(),
                reason: reason.clone(),
            });
        }

        state.next_id += 1;
        let id = JobId::new(format!("job-{}", state.next_id));
        let script = state.next_scripts.pop_front().unwrap_or_default();
        let job = ScriptedJob::new(task, request.parameters.clone(), script);

        state.submitted.push((task.to_string(), request));
        state.jobs.insert(id.clone(), job);
        Ok(id)
    }

    async fn get_status(&self, job_id: &JobId) -> Result<JobStatus> {
        match self.next_status(job_id) {
            Some(outcome) => outcome,
            None => std::future::pending().await,
        }
    }

    async fn get_result(&self, job_id: &JobId) -> Result<RunOutput> {
        let state = self.state.lock().unwrap();
        let job = state.jobs.get(job_id).ok_or_else(|| ClientError::NotFound {
            job_id: job_id.clone(),
        })?;

        match (&job.result, job.current) {
            (Some(result), JobStatus::Succeeded) => Ok(RunOutput::new(result.clone())),
            _ => Err(ClientError::api_error(409, "run has not succeeded")),
        }
    }

    async fn get_run(&self, job_id: &JobId) -> Result<Run> {
        let state = self.state.lock().unwrap();
        let job = state.jobs.get(job_id).ok_or_else(|| ClientError::NotFound {
            job_id: job_id.clone(),
        })?;

        Ok(Run {
            id: job_id.clone(),
            task: job.task.clone(),
            status: job.current,
            parameters: job.parameters.clone(),
            result: job.result.clone(),
            error: job.error.clone(),
            compute: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }
}
