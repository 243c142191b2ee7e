//! DeskPilot CLI
//!
//! Command-line interface for launching automation jobs on the DeskPilot
//! orchestrator and inspecting them.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "deskpilot")]
#[command(about = "DeskPilot automation job CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(
        long,
        env = "DESKPILOT_ORCHESTRATOR_URL",
        default_value = "http://localhost:5000"
    )]
    orchestrator_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        orchestrator_url: cli.orchestrator_url,
    };

    handle_command(cli.command, &config).await
}
