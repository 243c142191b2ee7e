//! Readiness probing
//!
//! A job is ready once a TCP connection to `host:port` succeeds. The probe
//! retries until the deadline; individual connect errors are never fatal.

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

/// Waits for a network endpoint to accept connections
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Returns `true` as soon as `host:port` accepts a connection, `false`
    /// once `deadline` has elapsed without one
    async fn wait_reachable(&self, host: &str, port: u16, deadline: Duration) -> bool;
}

/// Polls with plain TCP connects at a fixed interval
pub struct ReadinessWaiter {
    poll_interval: Duration,
}

impl ReadinessWaiter {
    pub fn new(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }
}

#[async_trait]
impl ReadinessProbe for ReadinessWaiter {
    async fn wait_reachable(&self, host: &str, port: u16, deadline: Duration) -> bool {
        let started = Instant::now();
        let give_up_at = started + deadline;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;

            let remaining = give_up_at.saturating_duration_since(Instant::now());
            // A single attempt may not outlive the overall deadline
            let attempt_budget = remaining.min(self.poll_interval).max(Duration::from_millis(1));

            match timeout(attempt_budget, TcpStream::connect((host, port))).await {
                Ok(Ok(_stream)) => {
                    info!(
                        "{}:{} ready after {} attempt(s) ({:?})",
                        host,
                        port,
                        attempts,
                        started.elapsed()
                    );
                    return true;
                }
                Ok(Err(e)) => debug!("{}:{} not ready: {}", host, port, e),
                Err(_) => debug!("{}:{} connect attempt timed out", host, port),
            }

            if Instant::now() + self.poll_interval > give_up_at {
                warn!(
                    "{}:{} not ready within {:?} ({} attempt(s))",
                    host, port, deadline, attempts
                );
                return false;
            }

            sleep(self.poll_interval).await;
        }
    }
}
