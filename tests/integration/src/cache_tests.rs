//! Response caching over HTTP

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_agents::*;
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_repeated_task_served_from_cache() {
    let server = MockAgentServer::start().await;
    server.mock_success("summary").await;

    let config = agent_config(&server.url(), &[]).with_cache(Duration::from_secs(60));
    let mut test = TestProxy::new("summarizer", config);

    let first = test.proxy.run(review_task()).await.unwrap();
    let second = test.proxy.run(review_task()).await.unwrap();

    assert!(!first.cached);
    assert!(second.cached);
    assert_eq!(second.content(), "summary");
    assert_eq!(server.calls().await, 1);

    let stats = test.proxy.cache().unwrap().stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(test.event_types().last(), Some(&"cache_hit"));
}

#[tokio::test]
async fn test_different_context_is_a_different_entry() {
    let server = MockAgentServer::start().await;
    server.mock_success("summary").await;

    let config = agent_config(&server.url(), &[]).with_cache(Duration::from_secs(60));
    let test = TestProxy::new("summarizer", config);

    test.proxy.run(review_task()).await.unwrap();
    test.proxy
        .run(review_task().with_context(serde_json::json!({ "diff": "other" })))
        .await
        .unwrap();

    assert_eq!(server.calls().await, 2);
}

#[tokio::test]
async fn test_expired_entry_calls_again() {
    let server = MockAgentServer::start().await;
    server.mock_success("summary").await;

    let config = agent_config(&server.url(), &[]).with_cache(Duration::from_millis(200));
    let test = TestProxy::new("summarizer", config);

    test.proxy.run(simple_task("sum")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    let again = test.proxy.run(simple_task("sum")).await.unwrap();

    assert!(!again.cached);
    assert_eq!(server.calls().await, 2);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let server = MockAgentServer::start().await;
    server.mock_busy_times(1).await;
    server.mock_success("recovered").await;

    let config = agent_config(&server.url(), &[])
        .with_max_failovers(0)
        .with_cache(Duration::from_secs(60));
    let test = TestProxy::new("summarizer", config);

    assert!(test.proxy.run(simple_task("sum")).await.is_err());
    let output = test.proxy.run(simple_task("sum")).await.unwrap();

    assert_eq!(output.content(), "recovered");
    assert!(!output.cached);
    assert_eq!(server.calls().await, 2);
}

#[tokio::test]
async fn test_cache_disabled_always_calls() {
    let server = MockAgentServer::start().await;
    server.mock_success("summary").await;

    let test = TestProxy::new("summarizer", agent_config(&server.url(), &[]));
    test.proxy.run(simple_task("sum")).await.unwrap();
    test.proxy.run(simple_task("sum")).await.unwrap();

    assert!(test.proxy.cache().is_none());
    assert_eq!(server.calls().await, 2);
}
