//! Configuration loading.
//!
//! A file is parsed according to its extension, then per-agent environment
//! overrides are applied, then `tokenEnv` references are resolved. Override
//! keys have the form `FORGE_A2A_<AGENT>_<SETTING>` where `<AGENT>` is the
//! upper-cased agent name with `-` replaced by `_`.

use crate::agent::{AgentDefinition, ForgeConfig};
use crate::error::{ConfigError, ConfigResult};
use crate::validation::ValidationReport;
use forge_routing::LoadBalancingStrategy;
use secrecy::SecretString;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "FORGE_A2A";

/// Supported file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML
    Yaml,
    /// TOML
    Toml,
    /// JSON
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("yaml" | "yml") => Some(Self::Yaml),
            Some("toml") => Some(Self::Toml),
            Some("json") => Some(Self::Json),
            _ => None,
        }
    }
}

/// Loads a [`ForgeConfig`]
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    /// Create a loader with no file and the process environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from a file
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Use these variables instead of the process environment
    #[must_use]
    pub fn with_env_source(mut self, env: HashMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    /// Load and validate. Fails if validation finds any error.
    pub async fn load(&self) -> ConfigResult<ForgeConfig> {
        let (config, report) = self.load_with_report().await?;
        if report.has_errors() {
            return Err(ConfigError::Invalid { report });
        }
        for issue in report.warnings() {
            warn!(field = %issue.field, "{}", issue.message);
        }
        Ok(config)
    }

    /// Load and return the validation report without failing on it
    pub async fn load_with_report(&self) -> ConfigResult<(ForgeConfig, ValidationReport)> {
        let mut config = match &self.path {
            Some(path) => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| ConfigError::Io {
                        path: path.clone(),
                        source,
                    })?;
                let format = ConfigFormat::from_path(path).ok_or_else(|| {
                    ConfigError::UnsupportedFormat { path: path.clone() }
                })?;
                let config = parse_str(&content, format, path)?;
                info!(
                    path = %path.display(),
                    agents = config.agents.len(),
                    "Configuration loaded"
                );
                config
            }
            None => ForgeConfig::default(),
        };

        let env = self.env_source();
        for agent in &mut config.agents {
            apply_env_overrides(agent, &env)?;
            resolve_token(agent, &env);
        }

        let report = config.validate();
        Ok((config, report))
    }

    fn env_source(&self) -> HashMap<String, String> {
        self.env
            .clone()
            .unwrap_or_else(|| std::env::vars().collect())
    }
}

/// Parse configuration text in a known format
pub fn parse_str(content: &str, format: ConfigFormat, path: &Path) -> ConfigResult<ForgeConfig> {
    match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content).map_err(|e| ConfigError::parse(path, e)),
        ConfigFormat::Toml => toml::from_str(content).map_err(|e| ConfigError::parse(path, e)),
        ConfigFormat::Json => serde_json::from_str(content).map_err(|e| ConfigError::parse(path, e)),
    }
}

fn apply_env_overrides(
    agent: &mut AgentDefinition,
    env: &HashMap<String, String>,
) -> ConfigResult<()> {
    let prefix = format!("{ENV_PREFIX}_{}_", agent.env_key());
    let get = |setting: &str| -> Option<(String, &String)> {
        let key = format!("{prefix}{setting}");
        env.get(&key).map(|value| (key, value))
    };
    let a2a = &mut agent.a2a;

    if let Some((key, value)) = get("SERVER_URL") {
        debug!(key = %key, "Applying environment override");
        a2a.server_url = value.trim().to_string();
    }

    if let Some((key, value)) = get("FAILOVER_SERVERS") {
        debug!(key = %key, "Applying environment override");
        a2a.failover.servers = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .collect();
    }

    if let Some((key, value)) = get("TOKEN") {
        debug!(key = %key, "Applying environment override");
        a2a.authentication.token = Some(SecretString::new(value.clone()));
    }

    if let Some((key, value)) = get("TIMEOUT_MS") {
        a2a.timeout = crate::duration::parse(value).map_err(|e| ConfigError::env(&key, e))?;
        debug!(key = %key, "Applying environment override");
    }

    if let Some((key, value)) = get("MAX_FAILOVERS") {
        let parsed = value
            .trim()
            .parse::<u32>()
            .map_err(|e| ConfigError::env(&key, e.to_string()))?;
        a2a.failover.max_failovers = Some(parsed);
        debug!(key = %key, "Applying environment override");
    }

    if let Some((key, value)) = get("STRATEGY") {
        a2a.failover.strategy = value
            .parse::<LoadBalancingStrategy>()
            .map_err(|e| ConfigError::env(&key, e))?;
        debug!(key = %key, "Applying environment override");
    }

    Ok(())
}

fn resolve_token(agent: &mut AgentDefinition, env: &HashMap<String, String>) {
    let auth = &mut agent.a2a.authentication;
    if auth.token.is_some() {
        return;
    }
    if let Some(var) = &auth.token_env {
        match env.get(var) {
            Some(value) if !value.is_empty() => {
                auth.token = Some(SecretString::new(value.clone()));
            }
            _ => debug!(agent = %agent.name, var = %var, "Token variable not set"),
        }
    }
}
