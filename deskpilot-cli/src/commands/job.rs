//! Job command handlers
//!
//! Handles listing tracked jobs and viewing their details.

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use deskpilot_client::OrchestratorClient;
use deskpilot_core::domain::job::{Job, JobState};

use crate::config::Config;

/// Job subcommands
#[derive(Subcommand)]
pub enum JobCommands {
    /// List all jobs, newest first
    List,
    /// Get job details
    Get {
        /// Deployment name
        name: String,
    },
}

/// Handle job commands
pub async fn handle_job_command(command: JobCommands, config: &Config) -> Result<()> {
    let client = config.client();

    match command {
        JobCommands::List => list_jobs(&client).await,
        JobCommands::Get { name } => get_job(&client, &name).await,
    }
}

async fn list_jobs(client: &OrchestratorClient) -> Result<()> {
    let jobs = client.list_jobs().await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }

    Ok(())
}

async fn get_job(client: &OrchestratorClient, name: &str) -> Result<()> {
    let job = match client.get_job(name).await {
        Ok(job) => job,
        Err(e) if e.is_not_found() => anyhow::bail!("No job named {}", name),
        Err(e) => return Err(e.into()),
    };
    print_job_details(&job);
    Ok(())
}

fn print_job_summary(job: &Job) {
    println!("  {} {}", "▸".cyan(), job.deployment_name);
    println!("    State:    {}", colorize_state(job.state));
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    if let (Some(vnc), Some(web)) = (job.vnc_node_port, job.web_node_port) {
        println!("    Ports:    {} (vnc) / {} (web)", vnc, web);
    }
    println!();
}

fn print_job_details(job: &Job) {
    println!("{}", "Job Details:".bold());
    println!("  Deployment: {}", job.deployment_name.cyan());
    println!("  Client:     {}", job.client_id);
    println!("  Frequency:  {}", job.frequency);
    if let Some(batch) = &job.batch_id {
        println!("  Batch:      {}", batch);
    }
    println!("  State:      {}", colorize_state(job.state));
    println!("  Created:    {}", job.created_at.format("%Y-%m-%d %H:%M:%S"));
    println!("  Updated:    {}", job.updated_at.format("%Y-%m-%d %H:%M:%S"));

    if let Some(port) = job.vnc_node_port {
        println!("  VNC port:   {}", port);
    }
    if let Some(port) = job.web_node_port {
        println!("  Web port:   {}", port);
    }
    if let Some(pod) = &job.pod_name {
        println!(
            "  Pod:        {} {}",
            pod,
            job.pod_ip.as_deref().unwrap_or_default().dimmed()
        );
    }

    if let Some(error) = &job.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }
}

/// Colorize job state for display
fn colorize_state(state: JobState) -> colored::ColoredString {
    let label = state.to_string();
    match state {
        JobState::Created
        | JobState::PortsAllocated
        | JobState::ManifestsRendered
        | JobState::Deployed => label.yellow(),
        JobState::Ready | JobState::ViewerNotified => label.cyan(),
        JobState::ReadyTimeout => label.magenta(),
        JobState::Completed | JobState::Cleaned => label.green(),
        JobState::Error => label.red(),
    }
}
