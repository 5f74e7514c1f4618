//! Narrator command-line front end.
//!
//! Usage:
//!   narrator heal reply.txt                 Repair model output into JSON
//!   narrator variables --category runtime   List template variables
//!   narrator providers                      List supported providers
//!   narrator validate-pack pack.json        Check a pack export
//!   narrator render --fixture f.json --story s1 --template suggestions
//!   narrator choices --fixture f.json --story s1 [--settings narrator.json]
//!
//! Provider API keys are read from the environment or a `.env` file.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // Logs go to stderr so stdout stays pipeable
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("narrator=info".parse()?),
        )
        .init();

    match cli.command {
        Commands::Heal { file } => commands::heal(file).await,
        Commands::Variables { category } => commands::variables(category, cli.json),
        Commands::Providers => commands::providers(cli.json),
        Commands::ValidatePack { file } => commands::validate_pack(&file).await,
        Commands::Render {
            story,
            template,
            pack,
            set,
        } => commands::render(&story, &template, pack.as_deref(), set, cli.json).await,
        Commands::Choices { story, settings } => commands::choices(&story, &settings, cli.json).await,
        Commands::Suggest { story, settings } => commands::suggest(&story, &settings, cli.json).await,
        Commands::Review { story, settings } => commands::review(&story, &settings, cli.json).await,
    }
}
