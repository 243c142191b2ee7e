//! Remote viewer launch
//!
//! Starts a VNC viewer on an operator workstation over SSH so a human can
//! watch the job. The launch is fire-and-forget: the remote command is sent
//! to the background and the SSH session ends right away.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ViewerConfig;

#[async_trait]
pub trait ViewerLauncher: Send + Sync {
    /// Launches a viewer pointed at `host:port`
    async fn launch(&self, host: &str, port: u16) -> Result<()>;
}

/// Launches the viewer through the system `ssh` client
///
/// When a password is configured the session is wrapped in `sshpass -e`
/// and the password travels in the `SSHPASS` environment variable, never on
/// the command line.
pub struct SshViewerLauncher {
    config: ViewerConfig,
}

impl SshViewerLauncher {
    pub fn new(config: ViewerConfig) -> Self {
        Self { config }
    }

    /// Remote shell command for a target
    ///
    /// The template runs under its own `sh -c` so leading variable
    /// assignments such as `DISPLAY=:0` apply to the viewer instead of being
    /// taken for the program name by `nohup`.
    pub fn remote_command(&self, host: &str, port: u16) -> String {
        let viewer = self
            .config
            .command_template
            .replace("{host}", host)
            .replace("{port}", &port.to_string());

        format!("nohup sh -c {} >/dev/null 2>&1 &", shell_quote(&viewer))
    }

    /// Program and arguments for one launch
    fn invocation(&self, host: &str, port: u16) -> (String, Vec<String>) {
        let mut args = Vec::new();

        let program = if self.config.password.is_some() {
            args.push("-e".to_string());
            args.push("ssh".to_string());
            "sshpass".to_string()
        } else {
            "ssh".to_string()
        };

        args.extend(
            ["-o", "StrictHostKeyChecking=accept-new", "-o", "ConnectTimeout=10"]
                .map(str::to_string),
        );
        if self.config.password.is_none() {
            args.extend(["-o", "BatchMode=yes"].map(str::to_string));
        }

        args.push(format!("{}@{}", self.config.user, self.config.host));
        args.push(self.remote_command(host, port));

        (program, args)
    }
}

/// Single-quotes `s` for a POSIX shell
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[async_trait]
impl ViewerLauncher for SshViewerLauncher {
    async fn launch(&self, host: &str, port: u16) -> Result<()> {
        let (program, args) = self.invocation(host, port);
        debug!("Launching viewer via {} {:?}", program, args);

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(password) = &self.config.password {
            command.env("SSHPASS", password);
        }

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to execute {}", program))?;

        if !output.status.success() {
            anyhow::bail!(
                "viewer launch on {} failed: exit_code={}, stderr='{}'",
                self.config.host,
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        info!(
            "Viewer launched on {} for {}:{}",
            self.config.host, host, port
        );
        Ok(())
    }
}
