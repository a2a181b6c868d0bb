//! End-to-end flows from a configuration file

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_agents::*;
use forge_config::ConfigLoader;
use forge_core::{Agent, CompositeEventEmitter, EventEmitter, ProxyError};
use forge_proxy::RemoteAgentProxy;
use forge_telemetry::{MetricsEventEmitter, TracingEventEmitter};
use pretty_assertions::assert_eq;
use prometheus::Registry;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create config file");
    file.write_all(content.as_bytes())
        .expect("Failed to write config file");
    file
}

#[tokio::test]
async fn test_config_file_to_output_with_metrics() {
    init_tracing();
    let primary = MockAgentServer::start().await;
    let backup = MockAgentServer::start().await;
    primary.mock_error(503, "overloaded", "busy").await;
    backup.mock_success("approved").await;

    let file = write_config(&yaml_config("code-review", &primary.url(), &[&backup.url()]));
    let config = ConfigLoader::new()
        .with_file(file.path())
        .with_env_source(HashMap::new())
        .load()
        .await
        .unwrap();
    let definition = config.agent("code-review").unwrap();

    let registry = Registry::new();
    let metrics = Arc::new(MetricsEventEmitter::new(&registry).unwrap());
    let emitters: Vec<Arc<dyn EventEmitter>> = vec![
        Arc::new(TracingEventEmitter::new("integration")),
        Arc::clone(&metrics) as Arc<dyn EventEmitter>,
    ];
    let proxy = forge_proxy::RemoteAgentProxyBuilder::from_definition(definition)
        .emitter(Arc::new(CompositeEventEmitter::new(emitters)))
        .build()
        .unwrap();

    let first = proxy.run(review_task()).await.unwrap();
    let second = proxy.run(review_task()).await.unwrap();

    assert_eq!(first.content(), "approved");
    assert!(second.cached);
    assert_eq!(primary.calls().await, 1);
    assert_eq!(backup.calls().await, 1);

    let primary_url = primary.url();
    let backup_url = backup.url();
    assert_eq!(
        metrics
            .attempts_total
            .with_label_values(&["code-review", primary_url.as_str(), "server_error"])
            .get(),
        1
    );
    assert_eq!(
        metrics
            .attempts_total
            .with_label_values(&["code-review", backup_url.as_str(), "success"])
            .get(),
        1
    );
    assert_eq!(
        metrics
            .calls_total
            .with_label_values(&["code-review", "cached"])
            .get(),
        1
    );
    assert_eq!(
        metrics
            .cache_hits_total
            .with_label_values(&["code-review"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_environment_overrides_server_url() {
    let real = MockAgentServer::start().await;
    real.mock_success("from env").await;

    let file = write_config(&yaml_config("code-review", "http://placeholder:9", &[]));
    let env = HashMap::from([(
        "FORGE_A2A_CODE_REVIEW_SERVER_URL".to_string(),
        real.url(),
    )]);
    let config = ConfigLoader::new()
        .with_file(file.path())
        .with_env_source(env)
        .load()
        .await
        .unwrap();

    let proxy = forge_proxy::RemoteAgentProxyBuilder::from_definition(
        config.agent("code-review").unwrap(),
    )
    .build()
    .unwrap();
    let output = proxy.run(simple_task("check")).await.unwrap();

    assert_eq!(output.content(), "from env");
}

#[tokio::test]
async fn test_cancel_stops_in_flight_call() {
    let slow = MockAgentServer::start().await;
    let backup = MockAgentServer::start().await;
    slow.mock_delayed("late", Duration::from_secs(5)).await;
    backup.mock_success("unused").await;

    let config = agent_config(&slow.url(), &[&backup.url()]).with_timeout(Duration::from_secs(10));
    let test = TestProxy::new("writer", config);

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        let _ = tx.send(true);
    });

    let started = tokio::time::Instant::now();
    let err = test
        .proxy
        .run_cancellable(simple_task("draft"), rx)
        .await
        .unwrap_err();

    assert!(matches!(err, ProxyError::Cancelled { .. }), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(backup.calls().await, 0);
    assert!(test
        .proxy
        .snapshot()
        .endpoints
        .iter()
        .all(|e| e.in_flight == 0));
}

#[tokio::test]
async fn test_proxies_behind_agent_trait() {
    let writer = MockAgentServer::start().await;
    let reviewer = MockAgentServer::start().await;
    writer.mock_success("draft v1").await;
    reviewer.mock_success("looks good").await;

    let agents: Vec<Arc<dyn Agent>> = vec![
        Arc::new(
            RemoteAgentProxy::builder("writer")
                .config(agent_config(&writer.url(), &[]))
                .build()
                .unwrap(),
        ),
        Arc::new(
            RemoteAgentProxy::builder("reviewer")
                .config(agent_config(&reviewer.url(), &[]))
                .build()
                .unwrap(),
        ),
    ];

    let mut outputs = Vec::new();
    for agent in &agents {
        let output = agent.run(simple_task("pipeline step")).await.unwrap();
        outputs.push((agent.name().to_string(), output.content()));
    }

    assert_eq!(
        outputs,
        vec![
            ("writer".to_string(), "draft v1".to_string()),
            ("reviewer".to_string(), "looks good".to_string()),
        ]
    );
}
