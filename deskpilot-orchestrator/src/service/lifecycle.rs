//! Job Lifecycle
//!
//! Drives one automation request from validation to a reachable desktop:
//! - Allocate a VNC and a web node port
//! - Render and apply the workload and its service
//! - Wait for the VNC port, record addresses, launch the viewer
//! - Hand the job to a background task that waits for completion and
//!   tears the resources down
//!
//! Only failures up to the apply are returned to the caller. Everything
//! after that is best effort and logged.

use deskpilot_core::domain::job::{Job, JobState, deployment_name, label_selector, service_name};
use deskpilot_core::domain::port::{PortKind, PortRange};
use deskpilot_core::dto::automation::{RunAutomation, RunAutomationResponse};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::tracker::{JobTracker, TrackerError};
use crate::cleanup::CleanupCoordinator;
use crate::cluster::{ClusterGateway, ManifestKind, ManifestParams, ManifestRenderer};
use crate::completion::CompletionWatcher;
use crate::config::Config;
use crate::ports::{AllocationError, PortAllocator};
use crate::readiness::ReadinessProbe;
use crate::repository::{AddressStore, JobAddresses};
use crate::viewer::ViewerLauncher;

pub const LAUNCH_STATUS: &str = "Deployment and service created; Remmina launched (if port ready)";

/// Cluster limit on resource names
const MAX_RESOURCE_NAME_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("no available {kind} node port in {range}")]
    ResourceExhausted { kind: PortKind, range: PortRange },

    #[error("failed to apply manifests")]
    ApplyFailed { details: String },

    #[error("failed to render manifests: {0:#}")]
    Render(anyhow::Error),

    #[error("port registry unavailable: {0:#}")]
    Registry(anyhow::Error),

    #[error(transparent)]
    State(#[from] TrackerError),

    #[error("provisioning task aborted: {0}")]
    Aborted(String),
}

impl From<AllocationError> for JobError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::Exhausted(range) => JobError::ResourceExhausted {
                kind: range.kind(),
                range,
            },
            AllocationError::Registry(e) => JobError::Registry(e),
        }
    }
}

/// Timing and addressing of the lifecycle
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    pub host_ip: String,
    pub vnc_container_port: u16,
    pub settle_delay: Duration,
    pub readiness_timeout: Duration,
    pub completion_timeout: Duration,
}

impl LifecycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            host_ip: config.host_ip.clone(),
            vnc_container_port: config.workload.vnc_container_port,
            settle_delay: config.settle_delay,
            readiness_timeout: config.readiness_timeout,
            completion_timeout: config.completion_timeout,
        }
    }
}

/// Everything the lifecycle talks to
pub struct Collaborators {
    pub cluster: Arc<dyn ClusterGateway>,
    pub renderer: Arc<dyn ManifestRenderer>,
    pub allocator: PortAllocator,
    pub readiness: Arc<dyn ReadinessProbe>,
    /// `None` when no viewer host is configured
    pub viewer: Option<Arc<dyn ViewerLauncher>>,
    pub addresses: Arc<dyn AddressStore>,
    pub completion: CompletionWatcher,
    pub cleanup: CleanupCoordinator,
}

pub struct JobLifecycleManager {
    settings: LifecycleSettings,
    deps: Collaborators,
    tracker: Arc<JobTracker>,
}

impl JobLifecycleManager {
    pub fn new(settings: LifecycleSettings, deps: Collaborators, tracker: Arc<JobTracker>) -> Self {
        Self {
            settings,
            deps,
            tracker,
        }
    }

    pub fn tracker(&self) -> &Arc<JobTracker> {
        &self.tracker
    }

    /// Runs the synchronous phase of a job and starts its background phase
    ///
    /// Returns once the viewer has been launched or the readiness wait gave
    /// up; both outcomes are a success for the caller. The work runs on its
    /// own task: a caller that stops waiting does not stop the job, which
    /// still reaches its background phase.
    pub async fn run(
        self: &Arc<Self>,
        request: RunAutomation,
    ) -> Result<RunAutomationResponse, JobError> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.provision(request).await })
            .await
            .map_err(|e| {
                error!("Provisioning task failed: {}", e);
                JobError::Aborted(e.to_string())
            })?
    }

    async fn provision(
        self: &Arc<Self>,
        request: RunAutomation,
    ) -> Result<RunAutomationResponse, JobError> {
        let (client_id, frequency) = validate(&request)?;
        let name = self.tracker.mint_name(&client_id, &frequency);

        self.tracker.insert(Job::new(
            client_id.clone(),
            frequency.clone(),
            request.batch_id.clone(),
            name.clone(),
        ));
        info!(
            "Accepted job {} (client {}, frequency {})",
            name, client_id, frequency
        );

        let vnc_node_port = match self.deps.allocator.allocate(PortKind::Vnc).await {
            Ok(port) => port,
            Err(e) => return Err(self.fail(&name, e.into())),
        };
        // A claimed VNC port stays visible on the record if the web range is exhausted
        let web_node_port = match self.deps.allocator.allocate(PortKind::Web).await {
            Ok(port) => port,
            Err(e) => {
                return Err(self.fail_with(&name, e.into(), |job| {
                    job.vnc_node_port = Some(vnc_node_port);
                }));
            }
        };
        self.tracker.transition(&name, JobState::PortsAllocated, |job| {
            job.vnc_node_port = Some(vnc_node_port);
            job.web_node_port = Some(web_node_port);
        })?;

        let params = ManifestParams {
            deployment_name: name.clone(),
            client_id: client_id.clone(),
            frequency: frequency.clone(),
            batch_id: request.batch_id.clone(),
            vnc_node_port,
            web_node_port,
        };
        let manifests = match self.render(&params) {
            Ok(manifests) => manifests,
            Err(e) => return Err(self.fail(&name, e)),
        };
        self.tracker
            .transition(&name, JobState::ManifestsRendered, |_| {})?;

        for manifest in &manifests {
            if let Err(e) = self.deps.cluster.apply(manifest).await {
                let details = format!("{:#}", e);
                error!("Apply of {} failed: {}", name, details);
                return Err(self.fail(&name, JobError::ApplyFailed { details }));
            }
        }
        self.tracker.transition(&name, JobState::Deployed, |_| {})?;
        info!(
            "Deployed {} on node ports {} (vnc) / {} (web)",
            name, vnc_node_port, web_node_port
        );

        tokio::time::sleep(self.settings.settle_delay).await;
        let (pod_name, pod_ip) = self.resolve_pod(&name).await;

        let reachable = self
            .deps
            .readiness
            .wait_reachable(
                &self.settings.host_ip,
                vnc_node_port,
                self.settings.readiness_timeout,
            )
            .await;
        let readiness = if reachable {
            JobState::Ready
        } else {
            warn!(
                "{} not reachable on {}:{} within {:?}, continuing without viewer",
                name, self.settings.host_ip, vnc_node_port, self.settings.readiness_timeout
            );
            JobState::ReadyTimeout
        };
        self.tracker.transition(&name, readiness, |job| {
            job.pod_name = Some(pod_name.clone()).filter(|p| !p.is_empty());
            job.pod_ip = Some(pod_ip.clone()).filter(|ip| !ip.is_empty());
        })?;

        self.record_addresses(&client_id, &frequency, vnc_node_port, web_node_port)
            .await;

        if readiness == JobState::Ready {
            self.notify_viewer(&name, vnc_node_port).await;
        }

        self.spawn_completion(name.clone(), pod_name.clone());

        Ok(RunAutomationResponse {
            status: LAUNCH_STATUS.to_string(),
            deployment_name: name,
            pod_name,
            pod_ip,
            vnc_port: self.settings.vnc_container_port,
            vnc_node_port,
            web_node_port,
        })
    }

    fn render(&self, params: &ManifestParams) -> Result<[String; 2], JobError> {
        let workload = self
            .deps
            .renderer
            .render(ManifestKind::Workload, params)
            .map_err(JobError::Render)?;
        let service = self
            .deps
            .renderer
            .render(ManifestKind::Service, params)
            .map_err(JobError::Render)?;
        Ok([workload, service])
    }

    /// Moves the job to `Error` and hands the error back
    fn fail(&self, name: &str, err: JobError) -> JobError {
        self.fail_with(name, err, |_| {})
    }

    fn fail_with(&self, name: &str, err: JobError, update: impl FnOnce(&mut Job)) -> JobError {
        let message = err.to_string();
        if let Err(e) = self.tracker.transition(name, JobState::Error, |job| {
            update(job);
            job.error = Some(message);
        }) {
            warn!("Could not mark {} as failed: {}", name, e);
        }
        err
    }

    /// Pod name and IP, empty when not (yet) known
    async fn resolve_pod(&self, name: &str) -> (String, String) {
        let pod_name = match self
            .deps
            .cluster
            .pod_name_by_label(&label_selector(name))
            .await
        {
            Ok(pod_name) => pod_name,
            Err(e) => {
                warn!("Failed to look up pod of {}: {:#}", name, e);
                String::new()
            }
        };

        if pod_name.is_empty() {
            warn!("No pod found for {} after settle delay", name);
            return (pod_name, String::new());
        }

        let pod_ip = match self.deps.cluster.pod_ip(&pod_name).await {
            Ok(ip) => ip,
            Err(e) => {
                warn!("Failed to read IP of pod {}: {:#}", pod_name, e);
                String::new()
            }
        };

        debug!("{} runs as pod {} ({})", name, pod_name, pod_ip);
        (pod_name, pod_ip)
    }

    async fn record_addresses(
        &self,
        client_id: &str,
        frequency: &str,
        vnc_node_port: u16,
        web_node_port: u16,
    ) {
        let addresses = JobAddresses::new(&self.settings.host_ip, vnc_node_port, web_node_port);
        if let Err(e) = self
            .deps
            .addresses
            .update_addresses(client_id, frequency, &addresses)
            .await
        {
            warn!(
                "Failed to record addresses for client {} frequency {}: {:#}",
                client_id, frequency, e
            );
        }
    }

    async fn notify_viewer(&self, name: &str, vnc_node_port: u16) {
        let Some(viewer) = &self.deps.viewer else {
            debug!("No viewer host configured, {} stays READY", name);
            return;
        };

        match viewer.launch(&self.settings.host_ip, vnc_node_port).await {
            Ok(()) => {
                if let Err(e) = self
                    .tracker
                    .transition(name, JobState::ViewerNotified, |_| {})
                {
                    warn!("{}", e);
                }
            }
            Err(e) => warn!("Viewer launch for {} failed: {:#}", name, e),
        }
    }

    // ========================================================================
    // Background phase
    // ========================================================================

    fn spawn_completion(self: &Arc<Self>, name: String, pod_name: String) {
        let manager = Arc::clone(self);
        let task_name = name.clone();
        let handle = tokio::spawn(async move { manager.complete(&task_name, pod_name).await });

        tokio::spawn(async move {
            match handle.await {
                Ok(()) => debug!("Background phase of {} finished", name),
                Err(e) if e.is_panic() => error!("Background phase of {} panicked: {}", name, e),
                Err(e) => error!("Background phase of {} was cancelled: {}", name, e),
            }
        });
    }

    async fn complete(&self, name: &str, pod_name: String) {
        let pod_name = if pod_name.is_empty() {
            self.resolve_pod(name).await.0
        } else {
            pod_name
        };

        if pod_name.is_empty() {
            error!(
                "No pod to watch for {}; job left uncleaned, manual cleanup required",
                name
            );
            return;
        }

        let completed = self
            .deps
            .completion
            .await_completion(&pod_name, self.settings.completion_timeout)
            .await;
        if !completed {
            error!(
                "{} did not complete within {:?}; job left uncleaned, manual cleanup required",
                name, self.settings.completion_timeout
            );
            return;
        }

        if let Err(e) = self.tracker.transition(name, JobState::Completed, |job| {
            job.pod_name = Some(pod_name.clone());
        }) {
            error!("{}", e);
            return;
        }

        match self.deps.cleanup.teardown(name).await {
            Ok(()) => {
                if let Err(e) = self.tracker.transition(name, JobState::Cleaned, |_| {}) {
                    error!("{}", e);
                }
            }
            Err(e) => error!("{}; resources leaked", e),
        }
    }
}

/// Returns trimmed `(client_id, frequency)`
fn validate(request: &RunAutomation) -> Result<(String, String), JobError> {
    let field = |value: &Option<String>, name: &str| -> Result<String, JobError> {
        let value = value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| JobError::Validation(format!("{} is required", name)))?;

        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(JobError::Validation(format!(
                "{} may only contain letters, digits and '-'",
                name
            )));
        }

        Ok(value.to_string())
    };

    let client_id = field(&request.client_id, "client_id")?;
    let frequency = field(&request.frequency, "frequency")?;

    // Longest name the job's resources can get, with a ten digit timestamp
    let longest = service_name(&deployment_name(&client_id, &frequency, 9_999_999_999));
    if longest.len() > MAX_RESOURCE_NAME_LEN {
        let budget = MAX_RESOURCE_NAME_LEN - (longest.len() - client_id.len() - frequency.len());
        return Err(JobError::Validation(format!(
            "client_id and frequency may not exceed {} characters together",
            budget
        )));
    }

    Ok((client_id, frequency))
}
