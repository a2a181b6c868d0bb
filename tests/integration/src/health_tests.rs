//! Health probing over HTTP

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_agents::*;
use forge_routing::HealthStatus;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_failed_probe_routes_around_endpoint() {
    let primary = MockAgentServer::start().await;
    let backup = MockAgentServer::start().await;
    primary.mock_health(503).await;
    primary.mock_success("primary").await;
    backup.mock_health(200).await;
    backup.mock_success("backup").await;

    let config = agent_config(&primary.url(), &[&backup.url()])
        .with_health_check(Duration::from_secs(60));
    let test = TestProxy::new("researcher", config);
    let output = test.proxy.run(simple_task("search")).await.unwrap();

    assert_eq!(output.content(), "backup");
    assert_eq!(primary.calls().await, 0);
    let statuses: Vec<HealthStatus> = test
        .proxy
        .snapshot()
        .endpoints
        .iter()
        .map(|e| e.status)
        .collect();
    assert_eq!(statuses, vec![HealthStatus::Unhealthy, HealthStatus::Healthy]);
}

#[tokio::test]
async fn test_all_unhealthy_still_tried_as_last_resort() {
    let primary = MockAgentServer::start().await;
    primary.mock_health(503).await;
    primary.mock_success("still answering").await;

    let config = agent_config(&primary.url(), &[]).with_health_check(Duration::from_secs(60));
    let test = TestProxy::new("researcher", config);
    let output = test.proxy.run(simple_task("search")).await.unwrap();

    assert_eq!(output.content(), "still answering");
    assert_eq!(primary.calls().await, 1);
}

#[tokio::test]
async fn test_probes_respect_interval() {
    let server = MockAgentServer::start().await;
    server.mock_health(200).await;
    server.mock_success("ok").await;

    let config = agent_config(&server.url(), &[]).with_health_check(Duration::from_secs(60));
    let test = TestProxy::new("researcher", config);
    for _ in 0..3 {
        test.proxy.run(simple_task("search")).await.unwrap();
    }

    let probes = server
        .server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == HEALTH_PATH)
        .count();
    assert_eq!(probes, 1);
}

#[tokio::test]
async fn test_probe_health_reports_every_endpoint() {
    let up = MockAgentServer::start().await;
    up.mock_health(200).await;
    let down = unreachable_url();

    let test = TestProxy::new("researcher", agent_config(&up.url(), &[&down]));
    let reports = test.proxy.probe_health().await;

    assert_eq!(reports.len(), 2);
    assert!(reports[0].reachable);
    assert_eq!(reports[0].status, HealthStatus::Healthy);
    assert!(!reports[1].reachable);
    assert_eq!(reports[1].status, HealthStatus::Unhealthy);
    assert!(reports[1].error.is_some());
}

#[tokio::test]
async fn test_disabled_probing_sends_no_probes() {
    let server = MockAgentServer::start().await;
    server.mock_health(200).await;
    server.mock_success("ok").await;

    let test = TestProxy::new("researcher", agent_config(&server.url(), &[]));
    test.proxy.run(simple_task("search")).await.unwrap();

    let requests = server.server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.url.path() != HEALTH_PATH));
}
