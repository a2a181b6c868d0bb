//! Authentication handling over HTTP

use crate::fixtures::*;
use crate::helpers::*;
use crate::mock_agents::*;
use forge_core::{AttemptOutcome, ProxyError, ProxyEvent};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_rejected_credential_never_fails_over() {
    let primary = MockAgentServer::start().await;
    let backup = MockAgentServer::start().await;
    primary.mock_unauthorized().await;
    backup.mock_success("unused").await;

    let config = agent_config(&primary.url(), &[&backup.url()]).with_token("stale");
    let mut test = TestProxy::new("reviewer", config);
    let err = test.proxy.run(simple_task("review")).await.unwrap_err();

    assert!(matches!(err, ProxyError::Auth { .. }), "{err:?}");
    assert_eq!(err.error_code(), "auth_error");
    assert_eq!(primary.calls().await, 1);
    assert_eq!(backup.calls().await, 0);

    let events = test.drain_events();
    let types: Vec<&str> = events.iter().map(ProxyEvent::event_type).collect();
    assert_eq!(types, vec!["attempt_started", "attempt_failed", "call_failed"]);
    assert!(matches!(
        &events[1],
        ProxyEvent::AttemptFailed {
            outcome: AttemptOutcome::AuthError { .. },
            will_failover: false,
            ..
        }
    ));
}

#[tokio::test]
async fn test_rejection_does_not_hurt_endpoint_health() {
    let server = MockAgentServer::start().await;
    server.mock_unauthorized().await;

    let test = TestProxy::new("reviewer", agent_config(&server.url(), &[]).with_token("stale"));
    for _ in 0..5 {
        assert!(test.proxy.run(simple_task("review")).await.is_err());
    }

    let endpoint = &test.proxy.snapshot().endpoints[0];
    assert_eq!(endpoint.consecutive_failures, 0);
    assert!(endpoint.status.is_available());
    assert_eq!(endpoint.recent_attempts.len(), 5);
}

#[tokio::test]
async fn test_bearer_token_is_sent() {
    let server = MockAgentServer::start().await;
    server.mock_requires_token("s3cret", "welcome").await;

    let config = agent_config(&server.url(), &[]).with_token("s3cret");
    let test = TestProxy::new("reviewer", config);
    let output = test.proxy.run(simple_task("review")).await.unwrap();

    assert_eq!(output.content(), "welcome");
}

#[tokio::test]
async fn test_required_token_missing_sends_nothing() {
    let server = MockAgentServer::start().await;
    server.mock_success("unused").await;

    let config = agent_config(&server.url(), &[]).with_auth_required(true);
    let test = TestProxy::new("reviewer", config);
    let err = test.proxy.run(simple_task("review")).await.unwrap_err();

    assert_eq!(err.error_code(), "auth_error");
    assert_eq!(server.calls().await, 0);
}
