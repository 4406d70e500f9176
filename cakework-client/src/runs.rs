//! Run-related API endpoints

use async_trait::async_trait;
use cakework_core::domain::job::{JobId, JobStatus};
use cakework_core::domain::run::{Run, RunOutput};
use cakework_core::dto::run::{
    ListRunsQuery, ResultResponse, RunRequestBody, StatusResponse, SubmitResponse,
};
use tracing::debug;

use crate::CakeworkClient;
use crate::error::Result;
use crate::service::JobService;

impl CakeworkClient {
    // =============================================================================
    // Run Lifecycle
    // =============================================================================

    /// Submit a new run of a task
    ///
    /// # Arguments
    /// * `task` - Name of the task registered under the configured app
    /// * `request` - Parameters and optional compute request
    ///
    /// # Returns
    /// The id assigned to the new run
    ///
    /// # Example
    /// ```no_run
    /// # use cakework_client::{CakeworkClient, ClientConfig};
    /// # use cakework_core::domain::parameters::Parameters;
    /// # use cakework_core::dto::run::RunRequestBody;
    /// # async fn example() -> cakework_client::Result<()> {
    /// let client = CakeworkClient::new(ClientConfig::new("http://localhost:8080", "token", "app"))?;
    /// let run_id = client
    ///     .submit_run("say_hello", RunRequestBody::new(Parameters::new().with("name", "jessie")))
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn submit_run(&self, task: &str, request: RunRequestBody) -> Result<JobId> {
        let submitted: Result<SubmitResponse> = async {
            let url = self.url(&["client", "projects", self.app_name(), "tasks", task, "runs"])?;
            let response = self
                .authorized(self.client.post(url))
                .json(&request)
                .send()
                .await?;

            self.handle_response(response).await
        }
        .await;

        let run_id = submitted.map_err(|e| e.for_submission(task))?.run_id;
        debug!(job_id = %run_id, task, "Submitted run");
        Ok(run_id)
    }

    /// Get the current status of a run
    pub async fn get_run_status(&self, run_id: &JobId) -> Result<JobStatus> {
        let response: StatusResponse = self
            .get_json(&["client", "runs", run_id.as_str(), "status"], None)
            .await
            .map_err(|e| e.for_job(run_id))?;

        Ok(response.status)
    }

    /// Get the result payload of a succeeded run
    pub async fn get_run_result(&self, run_id: &JobId) -> Result<RunOutput> {
        let response: ResultResponse = self
            .get_json(&["client", "runs", run_id.as_str(), "result"], None)
            .await
            .map_err(|e| e.for_job(run_id))?;

        Ok(response.result)
    }

    /// Get the full record of a run
    pub async fn get_run(&self, run_id: &JobId) -> Result<Run> {
        self.get_json(&["client", "runs", run_id.as_str()], None)
            .await
            .map_err(|e| e.for_job(run_id))
    }

    // =============================================================================
    // Run Query
    // =============================================================================

    /// List the runs of a task
    ///
    /// # Arguments
    /// * `task` - Task name under the configured app
    /// * `status` - Only return runs currently in this status
    pub async fn list_runs(&self, task: &str, status: Option<JobStatus>) -> Result<Vec<Run>> {
        self.get_json(
            &["client", "projects", self.app_name(), "tasks", task, "runs"],
            Some(ListRunsQuery { status }),
        )
        .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        query: Option<ListRunsQuery>,
    ) -> Result<T> {
        let url = self.url(segments)?;
        let mut request = self.authorized(self.client.get(url));
        if let Some(query) = query {
            request = request.query(&query);
        }
        let response = request.send().await?;

        self.handle_response(response).await
    }
}

#[async_trait]
impl JobService for CakeworkClient {
    async fn submit(&self, task: &str, request: RunRequestBody) -> Result<JobId> {
        self.submit_run(task, request).await
    }

    async fn get_status(&self, job_id: &JobId) -> Result<JobStatus> {
        self.get_run_status(job_id).await
    }

    async fn get_result(&self, job_id: &JobId) -> Result<RunOutput> {
        self.get_run_result(job_id).await
    }

    async fn get_run(&self, job_id: &JobId) -> Result<Run> {
        CakeworkClient::get_run(self, job_id).await
    }
}
