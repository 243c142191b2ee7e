//! Completion detection
//!
//! A job is complete once its output contains the sentinel line. Output
//! already produced is checked first; only if the sentinel is not there yet
//! is a follow stream opened. The stream is dropped (and the follow request
//! with it) as soon as the sentinel is seen, the output ends, or the
//! timeout expires.

use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cluster::ClusterGateway;

pub struct CompletionWatcher {
    cluster: Arc<dyn ClusterGateway>,
    sentinel: String,
}

impl CompletionWatcher {
    pub fn new(cluster: Arc<dyn ClusterGateway>, sentinel: impl Into<String>) -> Self {
        Self {
            cluster,
            sentinel: sentinel.into(),
        }
    }

    /// Waits until the pod's output contains the sentinel
    ///
    /// `within` bounds the follow phase only. Returns `false` on timeout, on
    /// end of output without the sentinel, or when the output cannot be
    /// followed at all.
    pub async fn await_completion(&self, pod_name: &str, within: Duration) -> bool {
        match self.cluster.fetch_logs(pod_name).await {
            Ok(output) if output.contains(&self.sentinel) => {
                info!("{} already completed", pod_name);
                return true;
            }
            Ok(_) => debug!("{} not completed yet, following output", pod_name),
            Err(e) => warn!("Failed to read output of {}: {:#}", pod_name, e),
        }

        match timeout(within, self.follow(pod_name)).await {
            Ok(found) => found,
            Err(_) => {
                warn!(
                    "{} did not report completion within {:?}",
                    pod_name, within
                );
                false
            }
        }
    }

    async fn follow(&self, pod_name: &str) -> bool {
        let mut lines = match self.cluster.stream_logs(pod_name).await {
            Ok(lines) => lines,
            Err(e) => {
                warn!("Failed to follow output of {}: {:#}", pod_name, e);
                return false;
            }
        };

        while let Some(line) = lines.next().await {
            match line {
                Ok(line) if line.contains(&self.sentinel) => {
                    info!("{} reported completion", pod_name);
                    return true;
                }
                Ok(line) => debug!("[{}] {}", pod_name, line),
                Err(e) => {
                    warn!("Output stream of {} failed: {:#}", pod_name, e);
                    return false;
                }
            }
        }

        warn!("Output of {} ended without completion marker", pod_name);
        false
    }
}
