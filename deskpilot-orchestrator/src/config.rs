//! Orchestrator configuration
//!
//! Defines all configurable parameters for the orchestrator: cluster access,
//! node port ranges, lifecycle timeouts, viewer host and database connection.

use anyhow::Context;
use deskpilot_core::domain::port::{PortKind, PortRange};
use std::path::PathBuf;
use std::time::Duration;

/// Orchestrator configuration
///
/// All timeouts and intervals are configurable so tests and slow clusters can
/// tune them independently.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP bind address (e.g., "0.0.0.0:5000")
    pub bind_addr: String,

    /// Address at which node ports are reachable from outside the cluster
    pub host_ip: String,

    /// Cluster control command, e.g. ["microk8s", "kubectl"]
    pub kubectl_command: Vec<String>,

    /// Namespace jobs are deployed into
    pub namespace: String,

    /// Directory holding the persisted port registries
    pub state_dir: PathBuf,

    pub vnc_range: PortRange,
    pub web_range: PortRange,

    /// How long an allocated port stays reserved without the cluster reporting it
    pub reservation_ttl: Duration,

    pub workload: WorkloadConfig,

    /// Wait after deployment before probing readiness
    pub settle_delay: Duration,
    pub readiness_timeout: Duration,
    pub readiness_poll_interval: Duration,

    pub completion_timeout: Duration,
    /// Marker in the job output signalling success
    pub completion_sentinel: String,

    /// How long finished job records stay queryable
    pub job_retention: Duration,

    /// Remote viewer host; `None` disables viewer launches
    pub viewer: Option<ViewerConfig>,

    /// MySQL connection string; `None` disables address updates
    pub database_url: Option<String>,
}

/// Parameters of the rendered workload
#[derive(Debug, Clone)]
pub struct WorkloadConfig {
    pub image: String,
    pub vnc_container_port: u16,
    pub web_container_port: u16,
}

/// Remote host that runs the VNC viewer
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub host: String,
    pub user: String,
    pub password: Option<String>,
    /// Remote command; `{host}` and `{port}` are substituted
    pub command_template: String,
}

pub const DEFAULT_VIEWER_COMMAND: &str = "DISPLAY=:0 remmina -c vnc://{host}:{port}";
pub const DEFAULT_SENTINEL: &str = "Har Generated successfully";

impl Config {
    /// Creates configuration from environment variables
    ///
    /// Every variable is optional; see `Default` for fallback values.
    /// - ORCHESTRATOR_BIND_ADDR, HOST_IP, MICROK8S_CMD, K8S_NAMESPACE
    /// - DESKPILOT_STATE_DIR
    /// - VNC_NODEPORT_RANGE, WEB_NODEPORT_RANGE (START-END, end exclusive)
    /// - PORT_RESERVATION_TTL (seconds)
    /// - JOB_IMAGE, JOB_VNC_CONTAINER_PORT, JOB_WEB_CONTAINER_PORT
    /// - SETTLE_DELAY, READINESS_TIMEOUT, READINESS_POLL_INTERVAL (seconds)
    /// - COMPLETION_TIMEOUT (seconds), COMPLETION_SENTINEL
    /// - JOB_RETENTION (seconds)
    /// - REMOTE_SSH_HOST, REMOTE_SSH_USER, REMOTE_SSH_PASS, VIEWER_COMMAND
    /// - DATABASE_URL
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let vnc_range = match env("VNC_NODEPORT_RANGE") {
            Some(raw) => PortRange::parse(PortKind::Vnc, &raw).context("VNC_NODEPORT_RANGE")?,
            None => defaults.vnc_range,
        };

        let web_range = match env("WEB_NODEPORT_RANGE") {
            Some(raw) => PortRange::parse(PortKind::Web, &raw).context("WEB_NODEPORT_RANGE")?,
            None => defaults.web_range,
        };

        let kubectl_command = env("MICROK8S_CMD")
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect())
            .unwrap_or(defaults.kubectl_command);

        let viewer = env("REMOTE_SSH_HOST").map(|host| ViewerConfig {
            host,
            user: env("REMOTE_SSH_USER").unwrap_or_else(|| "root".to_string()),
            password: env("REMOTE_SSH_PASS"),
            command_template: env("VIEWER_COMMAND")
                .unwrap_or_else(|| DEFAULT_VIEWER_COMMAND.to_string()),
        });

        Ok(Self {
            bind_addr: env("ORCHESTRATOR_BIND_ADDR").unwrap_or(defaults.bind_addr),
            host_ip: env("HOST_IP").unwrap_or(defaults.host_ip),
            kubectl_command,
            namespace: env("K8S_NAMESPACE").unwrap_or(defaults.namespace),
            state_dir: env("DESKPILOT_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.state_dir),
            vnc_range,
            web_range,
            reservation_ttl: secs("PORT_RESERVATION_TTL")?.unwrap_or(defaults.reservation_ttl),
            workload: WorkloadConfig {
                image: env("JOB_IMAGE").unwrap_or(defaults.workload.image),
                vnc_container_port: parsed("JOB_VNC_CONTAINER_PORT")?
                    .unwrap_or(defaults.workload.vnc_container_port),
                web_container_port: parsed("JOB_WEB_CONTAINER_PORT")?
                    .unwrap_or(defaults.workload.web_container_port),
            },
            settle_delay: secs("SETTLE_DELAY")?.unwrap_or(defaults.settle_delay),
            readiness_timeout: secs("READINESS_TIMEOUT")?.unwrap_or(defaults.readiness_timeout),
            readiness_poll_interval: secs("READINESS_POLL_INTERVAL")?
                .unwrap_or(defaults.readiness_poll_interval),
            completion_timeout: secs("COMPLETION_TIMEOUT")?
                .unwrap_or(defaults.completion_timeout),
            completion_sentinel: env("COMPLETION_SENTINEL")
                .unwrap_or(defaults.completion_sentinel),
            job_retention: secs("JOB_RETENTION")?.unwrap_or(defaults.job_retention),
            viewer,
            database_url: env("DATABASE_URL"),
        })
    }

    /// Longest a live job goes between two state changes
    ///
    /// Covers the settle delay plus readiness wait before READY, and the
    /// completion wait after it.
    pub fn lifecycle_step_bound(&self) -> Duration {
        self.settle_delay + self.readiness_timeout + self.completion_timeout
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host_ip.is_empty() {
            anyhow::bail!("host_ip cannot be empty");
        }

        if self.kubectl_command.is_empty() {
            anyhow::bail!("cluster control command cannot be empty");
        }

        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        if self.vnc_range.overlaps(&self.web_range) {
            anyhow::bail!(
                "port ranges must be disjoint: {} overlaps {}",
                self.vnc_range,
                self.web_range
            );
        }

        if self.readiness_poll_interval.is_zero() {
            anyhow::bail!("readiness_poll_interval must be greater than 0");
        }

        if self.readiness_timeout.is_zero() {
            anyhow::bail!("readiness_timeout must be greater than 0");
        }

        if self.completion_timeout.is_zero() {
            anyhow::bail!("completion_timeout must be greater than 0");
        }

        if self.completion_sentinel.is_empty() {
            anyhow::bail!("completion_sentinel cannot be empty");
        }

        if let Some(viewer) = &self.viewer {
            if viewer.host.is_empty() || viewer.user.is_empty() {
                anyhow::bail!("viewer host and user cannot be empty");
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            host_ip: "127.0.0.1".to_string(),
            kubectl_command: vec!["microk8s".to_string(), "kubectl".to_string()],
            namespace: "default".to_string(),
            state_dir: PathBuf::from("."),
            vnc_range: PortRange::new(PortKind::Vnc, 31000, 32000)
                .expect("default vnc range is non-empty"),
            web_range: PortRange::new(PortKind::Web, 32001, 33001)
                .expect("default web range is non-empty"),
            reservation_ttl: Duration::from_secs(600),
            workload: WorkloadConfig {
                image: "deskpilot/automation:latest".to_string(),
                vnc_container_port: 5901,
                web_container_port: 6080,
            },
            settle_delay: Duration::from_secs(5),
            readiness_timeout: Duration::from_secs(60),
            readiness_poll_interval: Duration::from_secs(2),
            completion_timeout: Duration::from_secs(300),
            completion_sentinel: DEFAULT_SENTINEL.to_string(),
            job_retention: Duration::from_secs(3600),
            viewer: None,
            database_url: None,
        }
    }
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>> {
    env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, raw))
        })
        .transpose()
}

fn secs(key: &str) -> anyhow::Result<Option<Duration>> {
    Ok(parsed::<u64>(key)?.map(Duration::from_secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.vnc_range.start(), 31000);
        assert_eq!(config.web_range.start(), 32001);
        assert_eq!(config.settle_delay, Duration::from_secs(5));
        assert_eq!(config.readiness_poll_interval, Duration::from_secs(2));
        assert_eq!(config.completion_sentinel, "Har Generated successfully");
        assert_eq!(config.lifecycle_step_bound(), Duration::from_secs(365));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.kubectl_command.clear();
        assert!(config.validate().is_err());
        config.kubectl_command = vec!["kubectl".to_string()];

        config.web_range = PortRange::new(PortKind::Web, 31500, 32500).unwrap();
        assert!(config.validate().is_err());
        config.web_range = PortRange::new(PortKind::Web, 32001, 33001).unwrap();

        config.readiness_poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.readiness_poll_interval = Duration::from_secs(2);

        config.viewer = Some(ViewerConfig {
            host: String::new(),
            user: "operator".to_string(),
            password: None,
            command_template: DEFAULT_VIEWER_COMMAND.to_string(),
        });
        assert!(config.validate().is_err());

        config.viewer = None;
        assert!(config.validate().is_ok());
    }
}
