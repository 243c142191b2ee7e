//! Port allocator
//!
//! Hands out the lowest free port of a range. Reconcile, scan and claim run
//! under the range's registry lock, so concurrent allocations on one range
//! never observe the same free port. The two ranges lock independently.

use deskpilot_core::domain::port::{PortKind, PortRange};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::registry::PortRegistry;
use crate::cluster::ClusterGateway;

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("no available node port in {0}")]
    Exhausted(PortRange),

    #[error(transparent)]
    Registry(#[from] anyhow::Error),
}

pub struct PortAllocator {
    cluster: Arc<dyn ClusterGateway>,
    vnc: PortRegistry,
    web: PortRegistry,
}

impl PortAllocator {
    pub fn new(cluster: Arc<dyn ClusterGateway>, vnc: PortRegistry, web: PortRegistry) -> Self {
        Self { cluster, vnc, web }
    }

    pub fn registry(&self, kind: PortKind) -> &PortRegistry {
        match kind {
            PortKind::Vnc => &self.vnc,
            PortKind::Web => &self.web,
        }
    }

    /// Allocates the lowest free port of the `kind` range
    ///
    /// The port is persisted and reserved before this returns.
    pub async fn allocate(&self, kind: PortKind) -> Result<u16, AllocationError> {
        let registry = self.registry(kind);
        let range = registry.range();

        let mut guard = registry.lock().await;
        let in_use = guard.reconcile(self.cluster.as_ref()).await?;

        let port = range
            .iter()
            .find(|port| !in_use.contains(port))
            .ok_or(AllocationError::Exhausted(range))?;

        guard.claim(port).await?;

        info!("Allocated {} node port {}", kind, port);
        Ok(port)
    }
}
