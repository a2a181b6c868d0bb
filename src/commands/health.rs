//! Health command - probe the endpoints of remote agents.

use anyhow::{anyhow, Result};
use clap::Args;
use forge_config::{AgentDefinition, ForgeConfig};
use forge_proxy::RemoteAgentProxy;
use forge_routing::ProbeReport;
use futures::future::try_join_all;
use serde::Serialize;
use std::time::Duration;
use tabled::Tabled;

use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the health command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Agent to probe (all agents when omitted)
    pub agent: Option<String>,

    /// Probe timeout (e.g. 2s)
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Exit with an error if any endpoint is unreachable
    #[arg(long)]
    pub strict: bool,
}

/// Probe results for one agent.
#[derive(Debug, Serialize)]
pub struct AgentHealth {
    pub agent: String,
    pub endpoints: Vec<ProbeReport>,
}

/// One probed endpoint, for table output.
#[derive(Debug, Tabled)]
struct EndpointRow {
    agent: String,
    endpoint: String,
    status: String,
    #[tabled(display_with = "format_latency")]
    latency_ms: u64,
    error: String,
}

fn format_latency(ms: &u64) -> String {
    format!("{ms}ms")
}

/// Execute the health command.
pub async fn execute(args: HealthArgs, config: ForgeConfig, json: bool) -> Result<()> {
    let format = OutputFormat::from_json_flag(json);

    let selected: Vec<&AgentDefinition> = match &args.agent {
        Some(name) => vec![config
            .agent(name)
            .ok_or_else(|| anyhow!("Unknown agent '{name}'"))?],
        None => config.agents.iter().collect(),
    };

    let spinner = (format == OutputFormat::Text).then(|| {
        output::spinner(&format!("Probing {} agent(s)...", selected.len()))
    });
    let results = try_join_all(
        selected
            .into_iter()
            .map(|definition| probe_agent(definition, args.timeout)),
    )
    .await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let results = results?;

    let unreachable = results
        .iter()
        .flat_map(|agent| &agent.endpoints)
        .filter(|report| !report.reachable)
        .count();

    match format {
        OutputFormat::Json => output::json(&CommandResult::success(&results))?,
        OutputFormat::Text => {
            let rows: Vec<EndpointRow> = results
                .iter()
                .flat_map(|agent| {
                    agent.endpoints.iter().map(|report| EndpointRow {
                        agent: agent.agent.clone(),
                        endpoint: report.endpoint.clone(),
                        status: output::health_label(report.status),
                        latency_ms: report.latency_ms,
                        error: report.error.clone().unwrap_or_default(),
                    })
                })
                .collect();
            output::table(&rows);

            if unreachable == 0 {
                output::success(&format!("All {} endpoint(s) reachable", rows.len()));
            } else {
                output::warning(&format!(
                    "{unreachable} of {} endpoint(s) unreachable",
                    rows.len()
                ));
            }
        }
    }

    if args.strict && unreachable > 0 {
        return Err(anyhow!("{unreachable} endpoint(s) unreachable"));
    }
    Ok(())
}

async fn probe_agent(definition: &AgentDefinition, timeout: Option<Duration>) -> Result<AgentHealth> {
    let mut a2a = definition.a2a.clone();
    if let Some(timeout) = timeout {
        a2a.health_check.timeout = timeout;
    }

    let proxy = RemoteAgentProxy::builder(definition.name.clone())
        .config(a2a)
        .build()?;

    Ok(AgentHealth {
        agent: definition.name.clone(),
        endpoints: proxy.probe_health().await,
    })
}
