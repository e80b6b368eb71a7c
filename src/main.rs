use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cli;
mod config;
mod error;
mod output;
mod parser;
mod provider;
mod record;
mod runner;
mod skills;
mod stage;
mod state;
mod telemetry;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("zonewise=debug")
    } else {
        EnvFilter::new("zonewise=warn")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cli::run::execute(args, cli.verbose).await,
        Commands::Skills(command) => cli::skills::execute(command).await,
        Commands::Schema { target } => cli::schema::execute(target),
    }
}
