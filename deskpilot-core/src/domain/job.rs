//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single provisioned automation job
///
/// Owned by the orchestrator for its whole lifetime; read-only everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub client_id: String,
    pub frequency: String,
    pub batch_id: Option<String>,
    /// Unique per request, `batch-{client_id}-{frequency}-{timestamp}`
    pub deployment_name: String,
    pub vnc_node_port: Option<u16>,
    pub web_node_port: Option<u16>,
    pub pod_name: Option<String>,
    pub pod_ip: Option<String>,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set when the job reached `Error`
    pub error: Option<String>,
}

impl Job {
    /// Creates a job in the `Created` state
    pub fn new(
        client_id: String,
        frequency: String,
        batch_id: Option<String>,
        deployment_name: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            client_id,
            frequency,
            batch_id,
            deployment_name,
            vnc_node_port: None,
            web_node_port: None,
            pod_name: None,
            pod_ip: None,
            state: JobState::Created,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }
}

/// Builds the deployment name for a request
///
/// Cluster resource names are lowercase, so identity fields are lowered.
pub fn deployment_name(client_id: &str, frequency: &str, timestamp: i64) -> String {
    format!(
        "batch-{}-{}-{}",
        client_id.to_ascii_lowercase(),
        frequency.to_ascii_lowercase(),
        timestamp
    )
}

/// Label selector for all resources belonging to a deployment
pub fn label_selector(deployment_name: &str) -> String {
    format!("app={}", deployment_name)
}

/// Service resource name for a deployment
pub fn service_name(deployment_name: &str) -> String {
    format!("{}-svc", deployment_name)
}

/// Lifecycle state of a job
///
/// ```text
/// CREATED -> PORTS_ALLOCATED -> MANIFESTS_RENDERED -> DEPLOYED
///   -> READY | READY_TIMEOUT -> [VIEWER_NOTIFIED] -> COMPLETED -> CLEANED
/// ```
///
/// `ERROR` absorbs failures of the synchronous phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    PortsAllocated,
    ManifestsRendered,
    Deployed,
    Ready,
    ReadyTimeout,
    ViewerNotified,
    Completed,
    Cleaned,
    Error,
}

impl JobState {
    /// Whether moving from `self` to `next` is a legal edge
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;

        match (self, next) {
            (Created, PortsAllocated) => true,
            (PortsAllocated, ManifestsRendered) => true,
            (ManifestsRendered, Deployed) => true,
            (Deployed, Ready | ReadyTimeout) => true,
            (Ready, ViewerNotified) => true,
            // A failed viewer launch leaves the job in READY
            (Ready | ReadyTimeout | ViewerNotified, Completed) => true,
            (Completed, Cleaned) => true,
            (Created | PortsAllocated | ManifestsRendered | Deployed, Error) => true,
            _ => false,
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Cleaned | JobState::Error)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Created => "CREATED",
            JobState::PortsAllocated => "PORTS_ALLOCATED",
            JobState::ManifestsRendered => "MANIFESTS_RENDERED",
            JobState::Deployed => "DEPLOYED",
            JobState::Ready => "READY",
            JobState::ReadyTimeout => "READY_TIMEOUT",
            JobState::ViewerNotified => "VIEWER_NOTIFIED",
            JobState::Completed => "COMPLETED",
            JobState::Cleaned => "CLEANED",
            JobState::Error => "ERROR",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            JobState::Created,
            JobState::PortsAllocated,
            JobState::ManifestsRendered,
            JobState::Deployed,
            JobState::Ready,
            JobState::ViewerNotified,
            JobState::Completed,
            JobState::Cleaned,
        ];

        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_degraded_path_skips_viewer() {
        assert!(JobState::Deployed.can_transition_to(JobState::ReadyTimeout));
        assert!(!JobState::ReadyTimeout.can_transition_to(JobState::ViewerNotified));
        assert!(JobState::ReadyTimeout.can_transition_to(JobState::Completed));
    }

    #[test]
    fn test_error_only_from_synchronous_states() {
        assert!(JobState::PortsAllocated.can_transition_to(JobState::Error));
        assert!(JobState::Deployed.can_transition_to(JobState::Error));
        assert!(!JobState::Ready.can_transition_to(JobState::Error));
        assert!(!JobState::Completed.can_transition_to(JobState::Error));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        let all = [
            JobState::Created,
            JobState::PortsAllocated,
            JobState::ManifestsRendered,
            JobState::Deployed,
            JobState::Ready,
            JobState::ReadyTimeout,
            JobState::ViewerNotified,
            JobState::Completed,
            JobState::Cleaned,
            JobState::Error,
        ];

        for terminal in [JobState::Cleaned, JobState::Error] {
            assert!(terminal.is_terminal());
            for next in all {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_state_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&JobState::ReadyTimeout).unwrap();
        assert_eq!(json, "\"READY_TIMEOUT\"");
        assert_eq!(JobState::ViewerNotified.to_string(), "VIEWER_NOTIFIED");
    }

    #[test]
    fn test_resource_names() {
        let job = Job::new(
            "9".to_string(),
            "15".to_string(),
            Some("1".to_string()),
            deployment_name("9", "15", 1_700_000_000),
        );

        assert_eq!(job.deployment_name, "batch-9-15-1700000000");
        assert_eq!(label_selector(&job.deployment_name), "app=batch-9-15-1700000000");
        assert_eq!(service_name(&job.deployment_name), "batch-9-15-1700000000-svc");
        assert_eq!(job.state, JobState::Created);
        assert_eq!(deployment_name("AcMe", "Daily", 7), "batch-acme-daily-7");
    }
}
