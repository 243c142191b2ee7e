//! Manifest rendering
//!
//! Turns job parameters into deployable resource descriptions. Rendering is
//! pure: no I/O, no cluster access.

use anyhow::{Context, Result};
use deskpilot_core::domain::job::service_name;
use serde_json::json;

use crate::config::WorkloadConfig;

/// Resource kinds rendered per job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// The pod running the automation
    Workload,
    /// The node-port service exposing it
    Service,
}

/// Values substituted into a manifest
#[derive(Debug, Clone)]
pub struct ManifestParams {
    pub deployment_name: String,
    pub client_id: String,
    pub frequency: String,
    pub batch_id: Option<String>,
    pub vnc_node_port: u16,
    pub web_node_port: u16,
}

pub trait ManifestRenderer: Send + Sync {
    fn render(&self, kind: ManifestKind, params: &ManifestParams) -> Result<String>;
}

/// Renders a bare Pod and a NodePort Service as YAML
pub struct KubeManifestRenderer {
    namespace: String,
    workload: WorkloadConfig,
}

impl KubeManifestRenderer {
    pub fn new(namespace: impl Into<String>, workload: WorkloadConfig) -> Self {
        Self {
            namespace: namespace.into(),
            workload,
        }
    }

    fn workload(&self, params: &ManifestParams) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Pod",
            "metadata": {
                "name": params.deployment_name,
                "namespace": self.namespace,
                "labels": { "app": params.deployment_name },
            },
            "spec": {
                "restartPolicy": "Never",
                "containers": [{
                    "name": "automation",
                    "image": self.workload.image,
                    "env": [
                        { "name": "CLIENT_ID", "value": params.client_id },
                        { "name": "FREQUENCY", "value": params.frequency },
                        { "name": "BATCH_ID", "value": params.batch_id.clone().unwrap_or_default() },
                    ],
                    "ports": [
                        { "name": "vnc", "containerPort": self.workload.vnc_container_port },
                        { "name": "web", "containerPort": self.workload.web_container_port },
                    ],
                }],
            },
        })
    }

    fn service(&self, params: &ManifestParams) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Service",
            "metadata": {
                "name": service_name(&params.deployment_name),
                "namespace": self.namespace,
                "labels": { "app": params.deployment_name },
            },
            "spec": {
                "type": "NodePort",
                "selector": { "app": params.deployment_name },
                "ports": [
                    {
                        "name": "vnc",
                        "port": self.workload.vnc_container_port,
                        "targetPort": self.workload.vnc_container_port,
                        "nodePort": params.vnc_node_port,
                    },
                    {
                        "name": "web",
                        "port": self.workload.web_container_port,
                        "targetPort": self.workload.web_container_port,
                        "nodePort": params.web_node_port,
                    },
                ],
            },
        })
    }
}

impl ManifestRenderer for KubeManifestRenderer {
    fn render(&self, kind: ManifestKind, params: &ManifestParams) -> Result<String> {
        let doc = match kind {
            ManifestKind::Workload => self.workload(params),
            ManifestKind::Service => self.service(params),
        };

        serde_yml::to_string(&doc)
            .with_context(|| format!("Failed to render {:?} manifest", kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn renderer() -> KubeManifestRenderer {
        KubeManifestRenderer::new(
            "jobs",
            WorkloadConfig {
                image: "registry.local/automation:1".to_string(),
                vnc_container_port: 5901,
                web_container_port: 6080,
            },
        )
    }

    fn params() -> ManifestParams {
        ManifestParams {
            deployment_name: "batch-9-15-1700000000".to_string(),
            client_id: "9".to_string(),
            frequency: "15".to_string(),
            batch_id: Some("1".to_string()),
            vnc_node_port: 31000,
            web_node_port: 32001,
        }
    }

    #[test]
    fn test_workload_manifest() {
        let yaml = renderer().render(ManifestKind::Workload, &params()).unwrap();
        let doc: Value = serde_yml::from_str(&yaml).unwrap();

        assert_eq!(doc["kind"], "Pod");
        assert_eq!(doc["metadata"]["namespace"], "jobs");
        assert_eq!(doc["metadata"]["labels"]["app"], "batch-9-15-1700000000");

        let container = &doc["spec"]["containers"][0];
        assert_eq!(container["image"], "registry.local/automation:1");
        assert_eq!(container["env"][0]["value"], "9");
        assert_eq!(container["env"][2]["value"], "1");
        assert_eq!(container["ports"][0]["containerPort"], 5901);
    }

    #[test]
    fn test_service_manifest_exposes_allocated_ports() {
        let yaml = renderer().render(ManifestKind::Service, &params()).unwrap();
        let doc: Value = serde_yml::from_str(&yaml).unwrap();

        assert_eq!(doc["kind"], "Service");
        assert_eq!(doc["metadata"]["name"], "batch-9-15-1700000000-svc");
        assert_eq!(doc["spec"]["type"], "NodePort");
        assert_eq!(doc["spec"]["selector"]["app"], "batch-9-15-1700000000");
        assert_eq!(doc["spec"]["ports"][0]["nodePort"], 31000);
        assert_eq!(doc["spec"]["ports"][1]["nodePort"], 32001);
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let renderer = renderer();
        let first = renderer.render(ManifestKind::Service, &params()).unwrap();
        let second = renderer.render(ManifestKind::Service, &params()).unwrap();
        assert_eq!(first, second);
    }
}
