//! Job teardown
//!
//! Removes the workload and the service of a finished job. Both deletions
//! are always attempted; a failure of one does not skip the other.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::cluster::ClusterGateway;
use deskpilot_core::domain::job::{label_selector, service_name};

#[derive(Debug, Error)]
#[error("teardown of {deployment_name} incomplete: {}", .failures.join("; "))]
pub struct CleanupError {
    pub deployment_name: String,
    pub failures: Vec<String>,
}

pub struct CleanupCoordinator {
    cluster: Arc<dyn ClusterGateway>,
}

impl CleanupCoordinator {
    pub fn new(cluster: Arc<dyn ClusterGateway>) -> Self {
        Self { cluster }
    }

    pub async fn teardown(&self, deployment_name: &str) -> Result<(), CleanupError> {
        let mut failures = Vec::new();

        let selector = label_selector(deployment_name);
        if let Err(e) = self.cluster.delete_by_label(&selector).await {
            error!("Failed to delete workload {}: {:#}", selector, e);
            failures.push(format!("workload: {:#}", e));
        }

        let service = service_name(deployment_name);
        if let Err(e) = self.cluster.delete_service(&service).await {
            error!("Failed to delete service {}: {:#}", service, e);
            failures.push(format!("service: {:#}", e));
        }

        if failures.is_empty() {
            info!("Cleaned up {}", deployment_name);
            Ok(())
        } else {
            Err(CleanupError {
                deployment_name: deployment_name.to_string(),
                failures,
            })
        }
    }
}
