//! Port registry
//!
//! Tracks the node ports believed to be in use within one [`PortRange`].
//! The cluster is the source of truth: every reconciliation re-derives the
//! set from the live services and rewrites the persisted copy. The file is a
//! newline-delimited list of ports, rewritten on reconcile and appended to on
//! every claim.
//!
//! Ports handed out but not yet visible in the cluster are kept as
//! reservations so that a reconcile running between allocation and apply
//! cannot free them. A reservation ends when the cluster reports the port or
//! when it outlives the reservation TTL (the job never appeared).

use anyhow::{Context, Result};
use deskpilot_core::domain::port::PortRange;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::cluster::ClusterGateway;

/// Persisted, reconciled set of in-use ports for one range
pub struct PortRegistry {
    range: PortRange,
    path: PathBuf,
    reservation_ttl: Duration,
    state: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    /// Claimed ports not yet seen in the cluster, with claim time
    reservations: HashMap<u16, Instant>,
}

impl PortRegistry {
    pub fn new(range: PortRange, path: impl Into<PathBuf>, reservation_ttl: Duration) -> Self {
        Self {
            range,
            path: path.into(),
            reservation_ttl,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn range(&self) -> PortRange {
        self.range
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquires exclusive access to this range
    ///
    /// Everything done through the guard is serialized with every other
    /// reconcile or claim on the same range.
    pub async fn lock(&self) -> RegistryGuard<'_> {
        RegistryGuard {
            registry: self,
            state: self.state.lock().await,
        }
    }

    /// Re-derives the in-use set from the cluster and persists it
    pub async fn reconcile(&self, cluster: &dyn ClusterGateway) -> Result<BTreeSet<u16>> {
        self.lock().await.reconcile(cluster).await
    }

    /// Returns the last persisted set without querying the cluster
    ///
    /// A missing file is an empty set; lines that are not ports of this
    /// range are ignored.
    pub async fn load(&self) -> Result<BTreeSet<u16>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read port registry {}", self.path.display())
                });
            }
        };

        Ok(content
            .lines()
            .filter_map(|line| line.trim().parse::<u16>().ok())
            .filter(|port| self.range.contains(*port))
            .collect())
    }

    async fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create registry directory {}", parent.display())
                })?;
            }
        }
        Ok(())
    }

    async fn rewrite(&self, ports: &BTreeSet<u16>) -> Result<()> {
        self.ensure_parent_dir().await?;

        let content: String = ports.iter().map(|port| format!("{}\n", port)).collect();
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write port registry {}", self.path.display()))
    }

    async fn append(&self, port: u16) -> Result<()> {
        self.ensure_parent_dir().await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open port registry {}", self.path.display()))?;

        file.write_all(format!("{}\n", port).as_bytes())
            .await
            .with_context(|| format!("Failed to append to port registry {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

/// Exclusive handle on one range's registry
pub struct RegistryGuard<'a> {
    registry: &'a PortRegistry,
    state: MutexGuard<'a, RegistryState>,
}

impl RegistryGuard<'_> {
    /// Re-derives the in-use set: live cluster node ports in range, plus
    /// reservations that are neither confirmed nor expired
    pub async fn reconcile(&mut self, cluster: &dyn ClusterGateway) -> Result<BTreeSet<u16>> {
        let range = self.registry.range;

        let live: BTreeSet<u16> = cluster
            .list_node_ports()
            .await
            .with_context(|| format!("Failed to list node ports for {}", range))?
            .into_iter()
            .filter(|port| range.contains(*port))
            .collect();

        let ttl = self.registry.reservation_ttl;
        self.state.reservations.retain(|port, claimed_at| {
            if live.contains(port) {
                debug!("Port {} confirmed by cluster", port);
                return false;
            }
            if claimed_at.elapsed() >= ttl {
                warn!(
                    "Reservation of port {} expired after {:?} without the cluster reporting it",
                    port, ttl
                );
                return false;
            }
            true
        });

        let mut in_use = live;
        in_use.extend(self.state.reservations.keys().copied());

        self.registry.rewrite(&in_use).await?;

        debug!("Reconciled {}: {} port(s) in use", range, in_use.len());
        Ok(in_use)
    }

    /// Records `port` as used: appended to the file and reserved
    pub async fn claim(&mut self, port: u16) -> Result<()> {
        if !self.registry.range.contains(port) {
            anyhow::bail!("Port {} is outside {}", port, self.registry.range);
        }

        self.registry.append(port).await?;
        self.state.reservations.insert(port, Instant::now());
        Ok(())
    }
}
