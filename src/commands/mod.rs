//! CLI commands module.

pub mod completions;
pub mod health;
pub mod run;
pub mod validate;

use anyhow::{Context, Result};
use forge_config::{ConfigError, ConfigResult, ForgeConfig, ValidationReport};
use std::path::Path;
use tracing::warn;

/// The configuration file as loaded at startup, with its validation report.
pub type LoadedConfig = ConfigResult<(ForgeConfig, ValidationReport)>;

/// Accept the loaded configuration only if it loaded and validated.
pub fn require_valid(loaded: LoadedConfig, path: &Path) -> Result<ForgeConfig> {
    let context = || format!("Failed to load configuration from {}", path.display());
    let (config, report) = loaded.with_context(context)?;
    if report.has_errors() {
        return Err(ConfigError::Invalid { report }).with_context(context);
    }
    for issue in report.warnings() {
        warn!(field = %issue.field, "{}", issue.message);
    }
    Ok(config)
}
