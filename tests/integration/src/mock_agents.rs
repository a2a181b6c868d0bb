//! Mock remote agents backed by wiremock

use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the proxy posts tasks to by default
pub const EXECUTE_PATH: &str = "/a2a/execute";

/// Path the proxy probes by default
pub const HEALTH_PATH: &str = "/health";

/// A mock remote agent
pub struct MockAgentServer {
    /// The underlying mock server
    pub server: MockServer,
}

impl MockAgentServer {
    /// Start a new mock agent
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Base URL of the agent
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Number of task requests received
    pub async fn calls(&self) -> usize {
        self.task_requests().await.len()
    }

    /// Bodies of the task requests received
    pub async fn task_requests(&self) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == EXECUTE_PATH)
            .filter_map(|r| serde_json::from_slice(&r.body).ok())
            .collect()
    }

    /// Answer every task with `output`
    pub async fn mock_success(&self, output: &str) {
        Mock::given(method("POST"))
            .and(path(EXECUTE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(agent_response(output)))
            .mount(&self.server)
            .await;
    }

    /// Answer every task with `output` after `delay`
    pub async fn mock_delayed(&self, output: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(EXECUTE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(agent_response(output))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Answer every task with a structured error
    pub async fn mock_error(&self, status: u16, code: &str, message: &str) {
        Mock::given(method("POST"))
            .and(path(EXECUTE_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": { "code": code, "message": message }
            })))
            .mount(&self.server)
            .await;
    }

    /// Fail the first `times` tasks with 503, then fall through to later mocks
    pub async fn mock_busy_times(&self, times: u64) {
        Mock::given(method("POST"))
            .and(path(EXECUTE_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": { "code": "overloaded", "message": "try again later" }
            })))
            .up_to_n_times(times)
            .mount(&self.server)
            .await;
    }

    /// Reject every task with 401
    pub async fn mock_unauthorized(&self) {
        Mock::given(method("POST"))
            .and(path(EXECUTE_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "code": "unauthorized", "message": "invalid token" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Answer only tasks carrying `Bearer {token}`
    pub async fn mock_requires_token(&self, token: &str, output: &str) {
        Mock::given(method("POST"))
            .and(path(EXECUTE_PATH))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(agent_response(output)))
            .mount(&self.server)
            .await;
        self.mock_unauthorized().await;
    }

    /// Answer health probes with `status`
    pub async fn mock_health(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(HEALTH_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "status": "ok" })))
            .mount(&self.server)
            .await;
    }
}

/// Success body for `output`
pub fn agent_response(output: &str) -> Value {
    json!({
        "output": output,
        "metadata": { "model": "mock-agent" }
    })
}
