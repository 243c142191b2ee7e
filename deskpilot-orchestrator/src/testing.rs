//! In-memory doubles for the collaborator seams

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::{self, Stream, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tempfile::TempDir;

use crate::cleanup::CleanupCoordinator;
use crate::cluster::{ClusterGateway, KubeManifestRenderer, LogStream};
use crate::completion::CompletionWatcher;
use crate::config::{DEFAULT_SENTINEL, WorkloadConfig};
use crate::ports::{PortAllocator, PortRegistry};
use crate::readiness::ReadinessProbe;
use crate::repository::{AddressStore, JobAddresses};
use crate::service::{Collaborators, JobLifecycleManager, JobTracker, LifecycleSettings};
use crate::viewer::ViewerLauncher;
use deskpilot_core::domain::port::{PortKind, PortRange};

// ============================================================================
// Cluster
// ============================================================================

#[derive(Default)]
struct ClusterState {
    node_ports: Vec<u16>,
    list_delay: Option<Duration>,
    fail_list: bool,
    fail_apply: bool,
    applied: Vec<String>,
    pod: Option<(String, String)>,
    buffered_logs: String,
    fail_fetch: bool,
    stream_lines: Vec<String>,
    stream_stays_open: bool,
    deleted_labels: Vec<String>,
    deleted_services: Vec<String>,
    fail_delete_workload: bool,
    fail_delete_service: bool,
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<ClusterState>,
    streams_opened: AtomicUsize,
    streams_dropped: Arc<AtomicUsize>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ClusterState> {
        self.state.lock().unwrap()
    }

    pub fn set_node_ports(&self, ports: Vec<u16>) {
        self.state().node_ports = ports;
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.state().list_delay = Some(delay);
    }

    pub fn fail_list_node_ports(&self, fail: bool) {
        self.state().fail_list = fail;
    }

    pub fn fail_apply(&self, fail: bool) {
        self.state().fail_apply = fail;
    }

    pub fn applied(&self) -> Vec<String> {
        self.state().applied.clone()
    }

    pub fn set_pod(&self, name: &str, ip: &str) {
        self.state().pod = Some((name.to_string(), ip.to_string()));
    }

    pub fn set_buffered_logs(&self, logs: &str) {
        self.state().buffered_logs = logs.to_string();
    }

    pub fn fail_fetch_logs(&self, fail: bool) {
        self.state().fail_fetch = fail;
    }

    /// Lines yielded by the next follow streams; with `stays_open` the stream
    /// never ends after the last line
    pub fn set_stream_lines(&self, lines: Vec<&str>, stays_open: bool) {
        let mut state = self.state();
        state.stream_lines = lines.into_iter().map(str::to_string).collect();
        state.stream_stays_open = stays_open;
    }

    pub fn streams_opened(&self) -> usize {
        self.streams_opened.load(Ordering::SeqCst)
    }

    pub fn streams_dropped(&self) -> usize {
        self.streams_dropped.load(Ordering::SeqCst)
    }

    pub fn deleted_labels(&self) -> Vec<String> {
        self.state().deleted_labels.clone()
    }

    pub fn deleted_services(&self) -> Vec<String> {
        self.state().deleted_services.clone()
    }

    pub fn fail_delete_workload(&self, fail: bool) {
        self.state().fail_delete_workload = fail;
    }

    pub fn fail_delete_service(&self, fail: bool) {
        self.state().fail_delete_service = fail;
    }
}

#[async_trait]
impl ClusterGateway for FakeCluster {
    async fn apply(&self, manifest: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_apply {
            anyhow::bail!("admission webhook denied the request");
        }
        state.applied.push(manifest.to_string());
        Ok(())
    }

    async fn list_node_ports(&self) -> Result<Vec<u16>> {
        let delay = self.state().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        if state.fail_list {
            anyhow::bail!("connection refused");
        }
        Ok(state.node_ports.clone())
    }

    async fn pod_name_by_label(&self, _selector: &str) -> Result<String> {
        Ok(self
            .state()
            .pod
            .as_ref()
            .map(|(name, _)| name.clone())
            .unwrap_or_default())
    }

    async fn pod_ip(&self, pod_name: &str) -> Result<String> {
        Ok(self
            .state()
            .pod
            .as_ref()
            .filter(|(name, _)| name == pod_name)
            .map(|(_, ip)| ip.clone())
            .unwrap_or_default())
    }

    async fn fetch_logs(&self, _pod_name: &str) -> Result<String> {
        let state = self.state();
        if state.fail_fetch {
            anyhow::bail!("container is waiting to start");
        }
        Ok(state.buffered_logs.clone())
    }

    async fn stream_logs(&self, _pod_name: &str) -> Result<LogStream> {
        let (lines, stays_open) = {
            let state = self.state();
            (state.stream_lines.clone(), state.stream_stays_open)
        };

        self.streams_opened.fetch_add(1, Ordering::SeqCst);

        let lines = stream::iter(lines.into_iter().map(Ok));
        let inner: LogStream = if stays_open {
            lines.chain(stream::pending()).boxed()
        } else {
            lines.boxed()
        };

        Ok(Box::pin(TrackedStream {
            inner,
            dropped: Arc::clone(&self.streams_dropped),
        }))
    }

    async fn delete_by_label(&self, selector: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_delete_workload {
            anyhow::bail!("pods \"{}\" is forbidden", selector);
        }
        state.deleted_labels.push(selector.to_string());
        Ok(())
    }

    async fn delete_service(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        if state.fail_delete_service {
            anyhow::bail!("services \"{}\" not found", name);
        }
        state.deleted_services.push(name.to_string());
        Ok(())
    }
}

/// Counts its own drop so tests can assert the follow was cancelled
struct TrackedStream {
    inner: LogStream,
    dropped: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Readiness, viewer, address store
// ============================================================================

/// Answers every probe with the same verdict
pub struct FixedProbe {
    reachable: bool,
    probes: Mutex<Vec<(String, u16)>>,
}

impl FixedProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable,
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn probes(&self) -> Vec<(String, u16)> {
        self.probes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReadinessProbe for FixedProbe {
    async fn wait_reachable(&self, host: &str, port: u16, _deadline: Duration) -> bool {
        self.probes.lock().unwrap().push((host.to_string(), port));
        self.reachable
    }
}

#[derive(Default)]
pub struct RecordingViewer {
    launches: Mutex<Vec<(String, u16)>>,
    fail: bool,
}

impl RecordingViewer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn launches(&self) -> Vec<(String, u16)> {
        self.launches.lock().unwrap().clone()
    }
}

#[async_trait]
impl ViewerLauncher for RecordingViewer {
    async fn launch(&self, host: &str, port: u16) -> Result<()> {
        self.launches.lock().unwrap().push((host.to_string(), port));
        if self.fail {
            anyhow::bail!("ssh: connect to host 10.0.0.5 port 22: No route to host");
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAddressStore {
    updates: Mutex<Vec<(String, String, JobAddresses)>>,
    fail: bool,
}

impl RecordingAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn updates(&self) -> Vec<(String, String, JobAddresses)> {
        self.updates.lock().unwrap().clone()
    }
}

#[async_trait]
impl AddressStore for RecordingAddressStore {
    async fn update_addresses(
        &self,
        client_id: &str,
        frequency: &str,
        addresses: &JobAddresses,
    ) -> Result<()> {
        if self.fail {
            anyhow::bail!("Lost connection to MySQL server");
        }
        self.updates.lock().unwrap().push((
            client_id.to_string(),
            frequency.to_string(),
            addresses.clone(),
        ));
        Ok(())
    }
}

// ============================================================================
// Lifecycle wiring
// ============================================================================

pub struct Options {
    pub reachable: bool,
    pub viewer: RecordingViewer,
    pub addresses: RecordingAddressStore,
    pub vnc_range: (u16, u16),
    pub settle_delay: Duration,
    pub completion_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            reachable: true,
            viewer: RecordingViewer::new(),
            addresses: RecordingAddressStore::new(),
            vnc_range: (31000, 32000),
            settle_delay: Duration::ZERO,
            completion_timeout: Duration::from_millis(200),
        }
    }
}

/// A manager wired to fakes, with handles on every fake
pub struct Harness {
    pub manager: Arc<JobLifecycleManager>,
    pub cluster: Arc<FakeCluster>,
    pub probe: Arc<FixedProbe>,
    pub viewer: Arc<RecordingViewer>,
    pub addresses: Arc<RecordingAddressStore>,
    _state_dir: TempDir,
}

pub fn harness(cluster: FakeCluster, options: Options) -> Harness {
    let state_dir = TempDir::new().unwrap();
    let cluster = Arc::new(cluster);
    let probe = Arc::new(FixedProbe::new(options.reachable));
    let viewer = Arc::new(options.viewer);
    let addresses = Arc::new(options.addresses);

    let ttl = Duration::from_secs(600);
    let allocator = PortAllocator::new(
        cluster.clone(),
        PortRegistry::new(
            PortRange::new(PortKind::Vnc, options.vnc_range.0, options.vnc_range.1).unwrap(),
            state_dir.path().join("vnc_nodeport_registry.txt"),
            ttl,
        ),
        PortRegistry::new(
            PortRange::new(PortKind::Web, 32001, 33001).unwrap(),
            state_dir.path().join("web_nodeport_registry.txt"),
            ttl,
        ),
    );

    let deps = Collaborators {
        cluster: cluster.clone(),
        renderer: Arc::new(KubeManifestRenderer::new(
            "default",
            WorkloadConfig {
                image: "deskpilot/automation:test".to_string(),
                vnc_container_port: 5901,
                web_container_port: 6080,
            },
        )),
        allocator,
        readiness: probe.clone(),
        viewer: Some(viewer.clone()),
        addresses: addresses.clone(),
        completion: CompletionWatcher::new(cluster.clone(), DEFAULT_SENTINEL),
        cleanup: CleanupCoordinator::new(cluster.clone()),
    };

    let settings = LifecycleSettings {
        host_ip: "10.0.0.1".to_string(),
        vnc_container_port: 5901,
        settle_delay: options.settle_delay,
        readiness_timeout: Duration::from_secs(60),
        completion_timeout: options.completion_timeout,
    };

    Harness {
        manager: Arc::new(JobLifecycleManager::new(
            settings,
            deps,
            Arc::new(JobTracker::new()),
        )),
        cluster,
        probe,
        viewer,
        addresses,
        _state_dir: state_dir,
    }
}

/// Cluster where every job finds its pod
pub fn running_pod() -> FakeCluster {
    let cluster = FakeCluster::new();
    cluster.set_pod("batch-pod-1", "10.1.0.7");
    cluster
}
