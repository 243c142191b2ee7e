//! Cluster access
//!
//! Everything the orchestrator needs from the container cluster goes through
//! the [`ClusterGateway`] trait. Resources are addressed by label selector or
//! name; no call is assumed atomic, fast, or infallible.

pub mod kubectl;
pub mod manifest;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

pub use kubectl::KubectlGateway;
pub use manifest::{KubeManifestRenderer, ManifestKind, ManifestParams, ManifestRenderer};

/// Lazily produced job output lines
///
/// Dropping the stream cancels the underlying follow request.
pub type LogStream = BoxStream<'static, Result<String>>;

/// Control-plane operations consumed by the lifecycle
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Applies a rendered manifest
    async fn apply(&self, manifest: &str) -> Result<()>;

    /// All node ports currently exposed by services in every namespace
    async fn list_node_ports(&self) -> Result<Vec<u16>>;

    /// Name of the first pod matching `selector`, or an empty string
    async fn pod_name_by_label(&self, selector: &str) -> Result<String>;

    /// Cluster-internal IP of a pod, or an empty string when not yet assigned
    async fn pod_ip(&self, pod_name: &str) -> Result<String>;

    /// Output the pod has produced so far
    async fn fetch_logs(&self, pod_name: &str) -> Result<String>;

    /// Follows the pod output line by line
    async fn stream_logs(&self, pod_name: &str) -> Result<LogStream>;

    /// Deletes every pod matching `selector`
    async fn delete_by_label(&self, selector: &str) -> Result<()>;

    /// Deletes a service by name
    async fn delete_service(&self, name: &str) -> Result<()>;
}
