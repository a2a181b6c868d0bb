//! CLI argument definitions using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, LoadedConfig};

/// Forge A2A - call remote agents with failover and caching
#[derive(Parser, Debug)]
#[command(name = "forge-a2a")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file (YAML, TOML or JSON)
    #[arg(
        short,
        long,
        env = "FORGE_A2A_CONFIG",
        default_value = "forge-a2a.yaml",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send a task to a remote agent
    Run(commands::run::RunArgs),

    /// Probe the endpoints of remote agents
    Health(commands::health::HealthArgs),

    /// Validate a configuration file
    Validate(commands::validate::ValidateArgs),

    /// Generate shell completions
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command against the configuration loaded at startup.
    pub async fn execute(self, loaded: LoadedConfig) -> Result<()> {
        match self.command {
            Commands::Run(args) => {
                let config = commands::require_valid(loaded, &self.config)?;
                commands::run::execute(args, config, self.json).await
            }
            Commands::Health(args) => {
                let config = commands::require_valid(loaded, &self.config)?;
                commands::health::execute(args, config, self.json).await
            }
            Commands::Validate(args) => {
                commands::validate::execute(args, &self.config, loaded, self.json)
            }
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
