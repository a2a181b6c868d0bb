//! Validate command - check a configuration file.

use anyhow::Result;
use clap::Args;
use forge_config::ValidationIssue;
use serde::Serialize;
use std::path::Path;

use super::LoadedConfig;
use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

/// Validation result.
#[derive(Debug, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub file: String,
    pub agents: Vec<String>,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// Execute the validate command.
pub fn execute(
    args: ValidateArgs,
    config_path: &Path,
    loaded: LoadedConfig,
    json: bool,
) -> Result<()> {
    let format = OutputFormat::from_json_flag(json);

    let file = config_path.display().to_string();
    let (config, report) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            let message = format!("Failed to load configuration: {e}");
            match format {
                OutputFormat::Json => output::json(&CommandResult::<()>::failure(
                    "load_error",
                    message.clone(),
                    None,
                ))?,
                OutputFormat::Text => output::error(&message),
            }
            return Err(e.into());
        }
    };

    let errors: Vec<ValidationIssue> = report.errors().cloned().collect();
    let warnings: Vec<ValidationIssue> = report.warnings().cloned().collect();
    let valid = errors.is_empty() && !(args.strict && !warnings.is_empty());

    let result = ValidationResult {
        valid,
        file,
        agents: config.agent_names().into_iter().map(String::from).collect(),
        errors,
        warnings,
    };

    print_result(&result, format)?;

    if result.valid {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Configuration is invalid: {} error(s), {} warning(s)",
            result.errors.len(),
            result.warnings.len()
        ))
    }
}

/// Print the validation result.
fn print_result(result: &ValidationResult, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let cmd_result = if result.valid {
                CommandResult::success(result)
            } else {
                CommandResult::failure("invalid_config", "Validation failed", Some(result))
            };
            output::json(&cmd_result)?;
        }
        OutputFormat::Text => {
            if result.valid {
                output::success(&format!("Configuration file is valid: {}", result.file));
                output::key_value("Agents", &result.agents.join(", "));
            } else {
                output::error(&format!("Configuration file is invalid: {}", result.file));
            }

            if !result.errors.is_empty() {
                output::section("Errors");
                for issue in &result.errors {
                    output::error(&format!("[{}] {}", issue.field, issue.message));
                }
            }

            if !result.warnings.is_empty() {
                output::section("Warnings");
                for issue in &result.warnings {
                    output::warning(&format!("[{}] {}", issue.field, issue.message));
                }
            }

            let total_issues = result.errors.len() + result.warnings.len();
            if total_issues > 0 {
                println!(
                    "\nFound {} error(s) and {} warning(s)",
                    result.errors.len(),
                    result.warnings.len()
                );
            }
        }
    }

    Ok(())
}
