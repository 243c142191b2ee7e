//! Launch command handlers

use anyhow::Result;
use clap::Args;
use colored::*;
use deskpilot_core::dto::automation::{FanOutResult, RunAutomation, RunAutomationResponse};

use crate::config::Config;

#[derive(Args)]
pub struct RunArgs {
    /// Client identifier
    #[arg(long)]
    pub client: String,

    /// Run frequency
    #[arg(long)]
    pub frequency: String,

    /// Optional batch identifier
    #[arg(long)]
    pub batch: Option<String>,
}

#[derive(Args)]
pub struct FanOutArgs {
    /// Client identifiers, one job each (repeatable)
    #[arg(long = "client", default_values = ["9", "25", "32"])]
    pub clients: Vec<String>,

    /// Run frequency shared by all jobs
    #[arg(long, default_value = "15")]
    pub frequency: String,

    /// Batch identifier shared by all jobs
    #[arg(long, default_value = "1")]
    pub batch: String,

    /// Print the aggregated results as JSON
    #[arg(long)]
    pub json: bool,
}

fn request(client: &str, frequency: &str, batch: Option<&str>) -> RunAutomation {
    let req = RunAutomation::new(client, frequency);
    match batch {
        Some(batch) => req.with_batch(batch),
        None => req,
    }
}

/// Launch a single job
pub async fn run(args: RunArgs, config: &Config) -> Result<()> {
    let client = config.client();
    let req = request(&args.client, &args.frequency, args.batch.as_deref());

    println!(
        "{}",
        format!(
            "Launching automation for client {} (frequency {})...",
            args.client, args.frequency
        )
        .dimmed()
    );

    let launched = client.run_automation(&req).await?;
    print_launch(&launched);

    Ok(())
}

/// Launch one job per client and report every outcome
pub async fn fan_out(args: FanOutArgs, config: &Config) -> Result<()> {
    let client = config.client();
    let requests = args
        .clients
        .iter()
        .map(|c| request(c, &args.frequency, Some(&args.batch)))
        .collect();

    let results = client.run_many(requests).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_fan_out(&results);
    }

    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} launch(es) failed", failed, results.len());
    }

    Ok(())
}

pub async fn health(config: &Config) -> Result<()> {
    config.client().health().await?;
    println!("{} Orchestrator at {} is up", "✓".green(), config.orchestrator_url);
    Ok(())
}

fn print_launch(launched: &RunAutomationResponse) {
    println!("{} {}", "✓".green(), launched.status);
    println!("  Deployment: {}", launched.deployment_name.cyan());
    if launched.pod_name.is_empty() {
        println!("  Pod:        {}", "(not resolved)".yellow());
    } else {
        println!(
            "  Pod:        {} {}",
            launched.pod_name,
            launched.pod_ip.dimmed()
        );
    }
    println!(
        "  VNC:        node port {} (container {})",
        launched.vnc_node_port.to_string().bold(),
        launched.vnc_port
    );
    println!(
        "  Web:        node port {}",
        launched.web_node_port.to_string().bold()
    );
}

fn print_fan_out(results: &[FanOutResult]) {
    println!("{}", format!("Launched {} request(s):", results.len()).bold());
    println!();

    for result in results {
        let client = result.payload.client_id.as_deref().unwrap_or("?");
        match (&result.response, &result.error) {
            (Some(response), _) => {
                println!("  {} Client {}", "▸".cyan(), client);
                println!("    Deployment: {}", response.deployment_name.dimmed());
                println!(
                    "    Ports:      {} (vnc) / {} (web)",
                    response.vnc_node_port, response.web_node_port
                );
            }
            (None, Some(error)) => {
                println!("  {} Client {}", "✗".red(), client);
                println!("    Error:      {}", error.red());
            }
            (None, None) => println!("  {} Client {}", "?".yellow(), client),
        }
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_building() {
        let req = request("9", "15", Some("1"));
        assert_eq!(req.client_id.as_deref(), Some("9"));
        assert_eq!(req.batch_id.as_deref(), Some("1"));

        assert!(request("9", "15", None).batch_id.is_none());
    }
}
