//! Ritual CLI
//!
//! Command-line interface for headless rituals and the sound print library.

use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ritual::cli::commands;
use ritual::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_target(false)
        .init();

    debug!("Ritual v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Ritual v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Perform { input, options } => commands::perform(&input, &options),
        Commands::Alter { id, options } => commands::alter(&id, &options),
        Commands::Library { library, action } => commands::library(&library, action),
        Commands::Config { path } => commands::write_config(&path),
    }
}
