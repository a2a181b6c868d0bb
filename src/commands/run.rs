//! Run command - send a task to a remote agent.

use anyhow::{anyhow, Result};
use clap::Args;
use forge_config::ForgeConfig;
use forge_core::{
    AgentOutput, AttemptRecord, CompositeEventEmitter, EventEmitter, ProxyError, Task,
};
use forge_proxy::RemoteAgentProxy;
use forge_telemetry::{MetricsEventEmitter, TracingEventEmitter};
use prometheus::{Registry, TextEncoder};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tabled::Tabled;
use tokio::sync::watch;

use crate::output::{self, CommandResult, OutputFormat};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Agent name from the configuration file
    pub agent: String,

    /// Task description
    pub task: String,

    /// Structured context as a JSON document
    #[arg(long, value_parser = parse_json)]
    pub context: Option<serde_json::Value>,

    /// Metadata forwarded to the agent, as key=value (repeatable)
    #[arg(short, long, value_parser = parse_key_value)]
    pub metadata: Vec<(String, String)>,

    /// Override the per-attempt timeout (e.g. 10s, 500ms)
    #[arg(long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// Override the failover budget
    #[arg(long)]
    pub max_failovers: Option<u32>,

    /// Print Prometheus metrics for the call
    #[arg(long)]
    pub metrics: bool,
}

/// Successful call output.
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub served_by: Option<String>,
    pub cached: bool,
    pub duration_ms: u64,
    pub output: serde_json::Value,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
}

/// Failed call details.
#[derive(Debug, Serialize)]
pub struct FailureOutput {
    pub agent: String,
    pub attempts: Vec<AttemptRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<String>,
}

/// One attempt, for table output.
#[derive(Debug, Tabled)]
struct AttemptRow {
    #[tabled(rename = "#")]
    number: usize,
    endpoint: String,
    outcome: String,
    #[tabled(display_with = "format_ms")]
    duration_ms: u64,
}

fn format_ms(ms: &u64) -> String {
    format!("{ms}ms")
}

/// Execute the run command.
pub async fn execute(args: RunArgs, config: ForgeConfig, json: bool) -> Result<()> {
    let format = OutputFormat::from_json_flag(json);

    let definition = config.agent(&args.agent).ok_or_else(|| {
        anyhow!(
            "Unknown agent '{}' (configured: {})",
            args.agent,
            config.agent_names().join(", ")
        )
    })?;

    let mut a2a = definition.a2a.clone();
    if let Some(timeout) = args.timeout {
        a2a = a2a.with_timeout(timeout);
    }
    if let Some(max_failovers) = args.max_failovers {
        a2a = a2a.with_max_failovers(max_failovers);
    }

    let registry = Registry::new();
    let mut emitters: Vec<Arc<dyn EventEmitter>> =
        vec![Arc::new(TracingEventEmitter::new("forge-a2a"))];
    if args.metrics {
        emitters.push(Arc::new(MetricsEventEmitter::new(&registry)?));
    }

    let proxy = RemoteAgentProxy::builder(definition.name.clone())
        .config(a2a)
        .emitter(Arc::new(CompositeEventEmitter::new(emitters)))
        .build()?;

    let mut task = Task::new(args.task);
    if let Some(context) = args.context {
        task = task.with_context(context);
    }
    for (key, value) in args.metadata {
        task = task.with_metadata(key, value);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(true);
        }
    });

    let spinner = (format == OutputFormat::Text)
        .then(|| output::spinner(&format!("Calling {}...", proxy.name())));
    let started = Instant::now();
    let result = proxy.run_cancellable(task, shutdown_rx).await;
    let elapsed = started.elapsed();
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let metrics = if args.metrics {
        Some(TextEncoder::new().encode_to_string(&registry.gather())?)
    } else {
        None
    };

    match result {
        Ok(out) => {
            print_success(proxy.name(), out, elapsed, metrics, format)?;
            Ok(())
        }
        Err(err) => {
            print_failure(proxy.name(), &err, metrics, format)?;
            Err(err.into())
        }
    }
}

fn print_success(
    agent: &str,
    out: AgentOutput,
    elapsed: Duration,
    metrics: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => output::json(&CommandResult::success(RunOutput {
            agent: agent.to_string(),
            served_by: out.served_by,
            cached: out.cached,
            duration_ms: elapsed.as_millis() as u64,
            output: out.output,
            metadata: out.metadata,
            metrics,
        })),
        OutputFormat::Text => {
            let content = out.content();
            output::success(&format!("{agent} completed the task"));
            if let Some(served_by) = &out.served_by {
                output::key_value("Served by", served_by);
            }
            output::key_value("Cached", if out.cached { "yes" } else { "no" });
            output::key_value("Duration", &output::format_duration(elapsed));

            output::section("Output");
            println!("{content}");

            if let Some(metrics) = metrics {
                output::section("Metrics");
                print!("{metrics}");
            }
            Ok(())
        }
    }
}

fn print_failure(
    agent: &str,
    err: &ProxyError,
    metrics: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => output::json(&CommandResult::failure(
            err.error_code(),
            err.to_string(),
            Some(FailureOutput {
                agent: agent.to_string(),
                attempts: err.attempts().to_vec(),
                metrics,
            }),
        )),
        OutputFormat::Text => {
            output::error(&format!("{agent} failed ({})", err.error_code()));

            if !err.attempts().is_empty() {
                output::section("Attempts");
                let rows: Vec<AttemptRow> = err
                    .attempts()
                    .iter()
                    .enumerate()
                    .map(|(i, attempt)| AttemptRow {
                        number: i + 1,
                        endpoint: attempt.endpoint.clone(),
                        outcome: attempt.outcome.to_string(),
                        duration_ms: attempt.duration.as_millis() as u64,
                    })
                    .collect();
                output::table(&rows);
            }

            if let Some(metrics) = metrics {
                output::section("Metrics");
                print!("{metrics}");
            }
            Ok(())
        }
    }
}

fn parse_json(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("invalid JSON: {e}"))
}

fn parse_key_value(value: &str) -> Result<(String, String), String> {
    let (key, val) = value
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{value}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{value}'"));
    }
    Ok((key.to_string(), val.to_string()))
}
