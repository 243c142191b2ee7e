//! kubectl-backed cluster gateway
//!
//! Shells out to the configured control command (`microk8s kubectl` by
//! default) for every operation:
//! - Applying manifests from stdin
//! - Listing node ports across all namespaces
//! - Resolving pods by label and reading their IP
//! - Reading and following pod logs
//! - Deleting pods and services

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio_stream::wrappers::SplitStream;
use tracing::debug;

use super::{ClusterGateway, LogStream};

/// Cluster gateway driving a kubectl-compatible binary
pub struct KubectlGateway {
    program: String,
    base_args: Vec<String>,
    namespace: String,
}

impl KubectlGateway {
    /// Creates a gateway
    ///
    /// # Arguments
    /// * `command` - Control command split into program and leading args,
    ///   e.g. `["microk8s", "kubectl"]`
    /// * `namespace` - Namespace for all namespaced operations
    pub fn new(command: Vec<String>, namespace: impl Into<String>) -> Result<Self> {
        let (program, base_args) = command
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("cluster control command cannot be empty"))?;

        Ok(Self {
            program: program.clone(),
            base_args: base_args.to_vec(),
            namespace: namespace.into(),
        })
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.base_args).kill_on_drop(true);
        command
    }

    /// Runs a command to completion and returns its stdout
    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!("Running {} {:?}", self.program, args);

        let output = self
            .command()
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to execute {} {:?}", self.program, args))?;

        check_output(args, output)
    }
}

fn check_output(args: &[&str], output: std::process::Output) -> Result<String> {
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr);

    if !output.status.success() {
        let exit_code = output.status.code().unwrap_or(-1);
        anyhow::bail!(
            "{:?} failed: exit_code={}, stdout='{}', stderr='{}'",
            args,
            exit_code,
            stdout.trim(),
            stderr.trim()
        );
    }

    if !stderr.trim().is_empty() {
        debug!("{:?} stderr: {}", args, stderr.trim());
    }

    Ok(stdout)
}

#[async_trait]
impl ClusterGateway for KubectlGateway {
    async fn apply(&self, manifest: &str) -> Result<()> {
        let args = ["apply", "-f", "-"];

        let mut child = self
            .command()
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to execute {} apply", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(manifest.as_bytes())
                .await
                .context("Failed to write manifest to apply stdin")?;
            // stdin is closed on drop so apply sees EOF
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for apply")?;

        let stdout = check_output(&args, output)?;
        debug!("apply: {}", stdout.trim());
        Ok(())
    }

    async fn list_node_ports(&self) -> Result<Vec<u16>> {
        let stdout = self
            .run(&[
                "get",
                "svc",
                "--all-namespaces",
                "-o",
                "jsonpath={..nodePort}",
            ])
            .await?;

        Ok(stdout
            .split_whitespace()
            .filter_map(|p| p.parse::<u16>().ok())
            .collect())
    }

    async fn pod_name_by_label(&self, selector: &str) -> Result<String> {
        let stdout = self
            .run(&[
                "get",
                "pods",
                "-l",
                selector,
                "-n",
                self.namespace.as_str(),
                "-o",
                "jsonpath={.items[*].metadata.name}",
            ])
            .await?;

        Ok(stdout
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string())
    }

    async fn pod_ip(&self, pod_name: &str) -> Result<String> {
        let stdout = self
            .run(&[
                "get",
                "pod",
                pod_name,
                "-n",
                self.namespace.as_str(),
                "-o",
                "jsonpath={.status.podIP}",
            ])
            .await?;

        Ok(stdout.trim().to_string())
    }

    async fn fetch_logs(&self, pod_name: &str) -> Result<String> {
        self.run(&["logs", pod_name, "-n", self.namespace.as_str()]).await
    }

    async fn stream_logs(&self, pod_name: &str) -> Result<LogStream> {
        let mut child = self
            .command()
            .args(["logs", "-f", pod_name, "-n", self.namespace.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to follow logs of {}", pod_name))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| anyhow::anyhow!("Failed to capture log stream stdout"))?;

        Ok(Box::pin(FollowLogs {
            lines: SplitStream::new(BufReader::new(stdout).split(b'\n')),
            _child: child,
        }))
    }

    async fn delete_by_label(&self, selector: &str) -> Result<()> {
        self.run(&["delete", "pods", "-l", selector, "-n", self.namespace.as_str()])
            .await?;
        Ok(())
    }

    async fn delete_service(&self, name: &str) -> Result<()> {
        self.run(&["delete", "svc", name, "-n", self.namespace.as_str()])
            .await?;
        Ok(())
    }
}

/// Line stream of a `logs -f` process
///
/// Owns the child so that dropping the stream kills the follow process.
/// Lines are decoded lossily, the same way buffered logs are, so a binary
/// frame in the output never ends the follow.
struct FollowLogs {
    lines: SplitStream<BufReader<ChildStdout>>,
    _child: Child,
}

impl Stream for FollowLogs {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.lines).poll_next(cx).map(|line| {
            line.map(|r| {
                r.map(|bytes| {
                    let line = String::from_utf8_lossy(&bytes);
                    line.strip_suffix('\r').unwrap_or(&line).to_string()
                })
                .map_err(anyhow::Error::from)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    /// Gateway whose "kubectl" is a shell snippet; trailing kubectl args
    /// become ignored positional parameters.
    fn shell_gateway(script: &str) -> KubectlGateway {
        KubectlGateway::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                script.to_string(),
                "--".to_string(),
            ],
            "default",
        )
        .unwrap()
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!(KubectlGateway::new(vec![], "default").is_err());
    }

    #[tokio::test]
    async fn test_list_node_ports_skips_garbage() {
        let gateway = shell_gateway("echo '31000 32001 oops 80'");
        let ports = gateway.list_node_ports().await.unwrap();
        assert_eq!(ports, vec![31000, 32001, 80]);
    }

    #[tokio::test]
    async fn test_pod_name_takes_first_match() {
        let gateway = shell_gateway("echo 'pod-a pod-b'");
        assert_eq!(gateway.pod_name_by_label("app=x").await.unwrap(), "pod-a");

        let gateway = shell_gateway("true");
        assert_eq!(gateway.pod_name_by_label("app=x").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_failure_reports_stderr() {
        let gateway = shell_gateway("echo 'forbidden' >&2; exit 3");
        let err = gateway.delete_service("svc").await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exit_code=3"), "{}", message);
        assert!(message.contains("forbidden"), "{}", message);
    }

    #[tokio::test]
    async fn test_apply_pipes_manifest_on_stdin() {
        let gateway = shell_gateway("grep -q 'kind: Pod'");
        assert!(gateway.apply("kind: Pod\n").await.is_ok());
        assert!(gateway.apply("kind: Service\n").await.is_err());
    }

    #[tokio::test]
    async fn test_stream_logs_yields_lines() {
        let gateway = shell_gateway("printf 'starting\\nHar Generated successfully\\n'");
        let lines: Vec<String> = gateway
            .stream_logs("pod")
            .await
            .unwrap()
            .map(|line| line.unwrap())
            .collect()
            .await;

        assert_eq!(lines, vec!["starting", "Har Generated successfully"]);
    }

    #[tokio::test]
    async fn test_stream_logs_survives_invalid_utf8() {
        let gateway = shell_gateway("printf 'frame \\377\\r\\nHar Generated successfully\\n'");
        let lines: Vec<String> = gateway
            .stream_logs("pod")
            .await
            .unwrap()
            .map(|line| line.unwrap())
            .collect()
            .await;

        assert_eq!(lines, vec!["frame \u{FFFD}", "Har Generated successfully"]);
    }
}
