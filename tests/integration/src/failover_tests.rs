//! Failover across endpoints over HTTP

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_agents::*;
use forge_core::{AttemptOutcome, ProxyError};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_unreachable_primary_fails_over() {
    let backup = MockAgentServer::start().await;
    backup.mock_success("reviewed").await;
    let primary = unreachable_url();

    let mut test = TestProxy::new("reviewer", agent_config(&primary, &[&backup.url()]));
    let output = test.proxy.run(review_task()).await.unwrap();

    assert_eq!(output.content(), "reviewed");
    assert_eq!(output.served_by.as_deref(), Some(backup.url().as_str()));
    assert!(!output.cached);
    assert_eq!(backup.calls().await, 1);
    assert_eq!(
        test.event_types(),
        vec![
            "attempt_started",
            "attempt_failed",
            "attempt_started",
            "call_succeeded"
        ]
    );
}

#[tokio::test]
async fn test_server_errors_fail_over_in_order() {
    let first = MockAgentServer::start().await;
    let second = MockAgentServer::start().await;
    let third = MockAgentServer::start().await;
    first.mock_error(503, "overloaded", "busy").await;
    second.mock_error(500, "internal", "boom").await;
    third.mock_success("done").await;

    let test = TestProxy::new(
        "writer",
        agent_config(&first.url(), &[&second.url(), &third.url()]),
    );
    let output = test.proxy.run(simple_task("draft")).await.unwrap();

    assert_eq!(output.served_by.as_deref(), Some(third.url().as_str()));
    assert_eq!(first.calls().await, 1);
    assert_eq!(second.calls().await, 1);
    assert_eq!(third.calls().await, 1);
}

#[tokio::test]
async fn test_exhausted_after_one_pass() {
    let servers = [
        MockAgentServer::start().await,
        MockAgentServer::start().await,
        MockAgentServer::start().await,
    ];
    for server in &servers {
        server.mock_error(503, "overloaded", "busy").await;
    }
    let urls: Vec<String> = servers.iter().map(MockAgentServer::url).collect();

    let mut test = TestProxy::new("writer", agent_config(&urls[0], &[&urls[1], &urls[2]]));
    let err = test.proxy.run(simple_task("draft")).await.unwrap_err();

    let ProxyError::Exhausted { attempts } = &err else {
        panic!("expected exhausted, got {err:?}");
    };
    let tried: Vec<&str> = attempts.iter().map(|a| a.endpoint.as_str()).collect();
    assert_eq!(tried, urls.iter().map(String::as_str).collect::<Vec<_>>());
    assert!(attempts.iter().all(|a| matches!(
        &a.outcome,
        AttemptOutcome::ServerError { code, .. } if code == "overloaded"
    )));
    for server in &servers {
        assert_eq!(server.calls().await, 1);
    }
    assert_eq!(test.event_types().last(), Some(&"call_exhausted"));
}

#[tokio::test]
async fn test_zero_failovers_tries_primary_only() {
    let primary = MockAgentServer::start().await;
    let backup = MockAgentServer::start().await;
    primary.mock_error(503, "overloaded", "busy").await;
    backup.mock_success("unused").await;

    let config = agent_config(&primary.url(), &[&backup.url()]).with_max_failovers(0);
    let test = TestProxy::new("writer", config);
    let err = test.proxy.run(simple_task("draft")).await.unwrap_err();

    assert_eq!(err.attempts().len(), 1);
    assert_eq!(backup.calls().await, 0);
}

#[tokio::test]
async fn test_timeout_fails_over() {
    let slow = MockAgentServer::start().await;
    let fast = MockAgentServer::start().await;
    slow.mock_delayed("late", Duration::from_secs(2)).await;
    fast.mock_success("on time").await;

    let config =
        agent_config(&slow.url(), &[&fast.url()]).with_timeout(Duration::from_millis(200));
    let test = TestProxy::new("writer", config);
    let output = test.proxy.run(simple_task("draft")).await.unwrap();

    assert_eq!(output.content(), "on time");
    let slow_history = &test.proxy.snapshot().endpoints[0].recent_attempts;
    assert_eq!(slow_history.len(), 1);
    assert_eq!(slow_history[0].outcome, AttemptOutcome::Timeout);
}

#[tokio::test]
async fn test_same_endpoint_repeat_waits_retry_delay() {
    let server = MockAgentServer::start().await;
    server.mock_busy_times(1).await;
    server.mock_success("second time").await;

    let config = agent_config(&server.url(), &[])
        .with_max_failovers(1)
        .with_retry_delay(Duration::from_millis(300));
    let test = TestProxy::new("writer", config);

    let started = tokio::time::Instant::now();
    let output = test.proxy.run(simple_task("draft")).await.unwrap();

    assert_eq!(output.content(), "second time");
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(server.calls().await, 2);
}

#[tokio::test]
async fn test_request_body_carries_task() {
    let server = MockAgentServer::start().await;
    server.mock_success("ok").await;

    let test = TestProxy::new("reviewer", agent_config(&server.url(), &[]));
    test.proxy.run(review_task()).await.unwrap();

    let requests = server.task_requests().await;
    assert_eq!(requests.len(), 1);
    let body = &requests[0];
    assert_eq!(body["task"], "Review the attached diff");
    assert_eq!(body["context"]["diff"], "- a\n+ b");
    assert_eq!(body["metadata"]["tenant"], "acme");
    assert!(body["metadata"]["requestId"].is_string());
}
