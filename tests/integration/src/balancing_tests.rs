//! Load balancing strategies over HTTP

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_agents::*;
use forge_routing::LoadBalancingStrategy;
use pretty_assertions::assert_eq;
use std::time::Duration;

async fn three_agents() -> [MockAgentServer; 3] {
    [
        MockAgentServer::start().await,
        MockAgentServer::start().await,
        MockAgentServer::start().await,
    ]
}

#[tokio::test]
async fn test_priority_prefers_primary() {
    let servers = three_agents().await;
    for server in &servers {
        server.mock_success("ok").await;
    }
    let urls: Vec<String> = servers.iter().map(MockAgentServer::url).collect();

    let test = TestProxy::new("writer", agent_config(&urls[0], &[&urls[1], &urls[2]]));
    for i in 0..4 {
        test.proxy.run(simple_task(&format!("task {i}"))).await.unwrap();
    }

    assert_eq!(servers[0].calls().await, 4);
    assert_eq!(servers[1].calls().await, 0);
    assert_eq!(servers[2].calls().await, 0);
}

#[tokio::test]
async fn test_round_robin_spreads_calls() {
    let servers = three_agents().await;
    for server in &servers {
        server.mock_success("ok").await;
    }
    let urls: Vec<String> = servers.iter().map(MockAgentServer::url).collect();
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();

    let test = TestProxy::new("writer", round_robin_config(&refs));
    let mut served = Vec::new();
    for i in 0..6 {
        let output = test.proxy.run(simple_task(&format!("task {i}"))).await.unwrap();
        served.push(output.served_by.unwrap_or_default());
    }

    for server in &servers {
        assert_eq!(server.calls().await, 2);
    }
    assert_eq!(served[0], urls[0]);
    assert_eq!(served[1], urls[1]);
    assert_eq!(served[2], urls[2]);
    assert_eq!(served[3], urls[0]);
}

#[tokio::test]
async fn test_round_robin_skips_failed_endpoint_within_call() {
    let servers = three_agents().await;
    servers[0].mock_error(503, "overloaded", "busy").await;
    servers[1].mock_success("ok").await;
    servers[2].mock_success("ok").await;
    let urls: Vec<String> = servers.iter().map(MockAgentServer::url).collect();
    let refs: Vec<&str> = urls.iter().map(String::as_str).collect();

    let test = TestProxy::new("writer", round_robin_config(&refs));
    let output = test.proxy.run(simple_task("draft")).await.unwrap();

    assert_eq!(output.served_by.as_deref(), Some(urls[1].as_str()));
}

#[tokio::test]
async fn test_least_connections_spreads_concurrent_calls() {
    let servers = three_agents().await;
    for server in &servers {
        server.mock_delayed("ok", Duration::from_millis(300)).await;
    }
    let urls: Vec<String> = servers.iter().map(MockAgentServer::url).collect();

    let config = agent_config(&urls[0], &[&urls[1], &urls[2]])
        .with_strategy(LoadBalancingStrategy::LeastConnections);
    let test = TestProxy::new("writer", config);

    let (a, b, c) = tokio::join!(
        test.proxy.run(simple_task("one")),
        test.proxy.run(simple_task("two")),
        test.proxy.run(simple_task("three")),
    );
    a.unwrap();
    b.unwrap();
    c.unwrap();

    for server in &servers {
        assert_eq!(server.calls().await, 1);
    }
    assert!(test
        .proxy
        .snapshot()
        .endpoints
        .iter()
        .all(|e| e.in_flight == 0));
}
