//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod job;
mod run;

pub use job::JobCommands;
pub use run::{FanOutArgs, RunArgs};

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Launch one automation job and wait for its desktop
    Run(RunArgs),
    /// Launch a job for each of several clients, one after another
    FanOut(FanOutArgs),
    /// Inspect tracked jobs
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },
    /// Check that the orchestrator is reachable
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
///
/// # Arguments
/// * `command` - The command to execute
/// * `config` - The CLI configuration
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Run(args) => run::run(args, config).await,
        Commands::FanOut(args) => run::fan_out(args, config).await,
        Commands::Job { command } => job::handle_job_command(command, config).await,
        Commands::Health => run::health(config).await,
    }
}
