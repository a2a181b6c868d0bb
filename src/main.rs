//! # Forge A2A CLI
//!
//! Command-line client for remote agents declared in a configuration file.
//!
//! ```bash
//! # Send a task to an agent
//! forge-a2a run researcher "Summarize the RAFT paper"
//!
//! # Probe every endpoint of an agent
//! forge-a2a health researcher
//!
//! # Check a configuration file
//! forge-a2a --config agents.yaml validate
//! ```

use anyhow::Result;
use clap::Parser;
use forge_config::{ConfigLoader, TelemetrySettings};
use forge_telemetry::{init_tracing, LogFormat};

mod cli;
mod commands;
mod output;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Read once; logging settings come from the file if it loads, and the
    // command gets the same result.
    let loaded = ConfigLoader::new()
        .with_file(&cli.config)
        .load_with_report()
        .await;
    let mut telemetry = match &loaded {
        Ok((config, _)) => config.telemetry.clone(),
        Err(_) => TelemetrySettings {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            ..TelemetrySettings::default()
        },
    };
    match cli.verbose {
        0 => {}
        1 => telemetry.level = "info".to_string(),
        2 => telemetry.level = "debug".to_string(),
        _ => telemetry.level = "trace".to_string(),
    }
    if cli.json {
        telemetry.format = LogFormat::Json;
    }
    let provider = init_tracing(&telemetry.tracing_config("forge-a2a"))?;

    let result = cli.execute(loaded).await;
    forge_telemetry::shutdown_tracing(provider);
    result
}
