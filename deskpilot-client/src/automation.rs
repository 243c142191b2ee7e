//! Automation endpoints

use crate::OrchestratorClient;
use crate::error::Result;
use deskpilot_core::domain::job::Job;
use deskpilot_core::dto::automation::{FanOutResult, RunAutomation, RunAutomationResponse};

impl OrchestratorClient {
    // =============================================================================
    // Automation Lifecycle
    // =============================================================================

    /// Launch an automation job
    ///
    /// Blocks until the orchestrator has deployed the job and waited for its
    /// desktop, which can take a minute or more.
    ///
    /// # Example
    /// ```no_run
    /// # use deskpilot_client::OrchestratorClient;
    /// # use deskpilot_core::dto::automation::RunAutomation;
    /// # async fn example() -> deskpilot_client::Result<()> {
    /// let client = OrchestratorClient::new("http://localhost:5000");
    /// let launched = client
    ///     .run_automation(&RunAutomation::new("9", "15").with_batch("1"))
    ///     .await?;
    /// println!("VNC on node port {}", launched.vnc_node_port);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn run_automation(&self, req: &RunAutomation) -> Result<RunAutomationResponse> {
        let url = format!("{}/run-automation", self.base_url);
        let response = self.client.post(&url).json(req).send().await?;

        self.handle_response(response).await
    }

    /// Launch several jobs one after another
    ///
    /// A failed request does not stop the remaining ones; every request gets
    /// exactly one result, in input order.
    pub async fn run_many(&self, requests: Vec<RunAutomation>) -> Vec<FanOutResult> {
        let mut results = Vec::with_capacity(requests.len());

        for payload in requests {
            let result = match self.run_automation(&payload).await {
                Ok(response) => FanOutResult {
                    payload,
                    response: Some(response),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("Automation request {:?} failed: {}", payload, e);
                    FanOutResult {
                        payload,
                        response: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(result);
        }

        results
    }

    /// List all jobs known to the orchestrator, newest first
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let url = format!("{}/jobs", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Get one job by deployment name
    pub async fn get_job(&self, deployment_name: &str) -> Result<Job> {
        let url = format!("{}/job/{}", self.base_url, deployment_name);
        let response = self.client.get(&url).send().await?;

        self.handle_response(response).await
    }

    /// Check that the orchestrator is up
    pub async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;

        self.handle_empty_response(response).await
    }
}
