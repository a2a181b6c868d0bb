//! HTTP transport.

use crate::wire::{WireErrorBody, WireRequest, WireResponse};
use async_trait::async_trait;
use forge_core::{AgentOutput, EndpointUrl, ProxyError, Task, Transport, TransportError};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Default path tasks are posted to
pub const DEFAULT_PATH: &str = "/a2a/execute";

/// Default health probe path
pub const DEFAULT_HEALTH_PATH: &str = "/health";

/// Transport that posts tasks as JSON over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    path: String,
    health_path: String,
    token: Option<SecretString>,
    auth_required: bool,
}

impl HttpTransport {
    /// Create a new transport builder
    #[must_use]
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::new()
    }

    /// Path tasks are posted to
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path probed for health
    #[must_use]
    pub fn health_path(&self) -> &str {
        &self.health_path
    }

    fn url(&self, endpoint: &EndpointUrl, path: &str) -> Result<reqwest::Url, TransportError> {
        endpoint
            .join_path(path)
            .map_err(|e| TransportError::connection(endpoint.to_string(), e.to_string()))
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &EndpointUrl,
    ) -> Result<reqwest::RequestBuilder, TransportError> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token.expose_secret())),
            None if self.auth_required => Err(TransportError::auth(
                endpoint.to_string(),
                "authentication is required but no token is configured",
            )),
            None => Ok(request),
        }
    }

    /// Map a reqwest error to a transport error.
    fn map_reqwest_error(
        error: &reqwest::Error,
        endpoint: &EndpointUrl,
        timeout: Duration,
    ) -> TransportError {
        if error.is_timeout() {
            TransportError::timeout(endpoint.to_string(), timeout)
        } else {
            // Connect failures, resets and truncated bodies all mean the
            // connection could not be established or maintained.
            TransportError::connection(endpoint.to_string(), error.to_string())
        }
    }

    /// Classify a non-success response.
    async fn handle_error_response(
        response: reqwest::Response,
        endpoint: &EndpointUrl,
    ) -> TransportError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed = WireErrorBody::parse(&body);

        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            let message = parsed
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return TransportError::auth(endpoint.to_string(), message);
        }

        match parsed {
            Some(error) => TransportError::remote(
                endpoint.to_string(),
                error
                    .code_string()
                    .unwrap_or_else(|| status.as_u16().to_string()),
                error.message.unwrap_or_else(|| status.to_string()),
                Some(status.as_u16()),
            ),
            None => TransportError::remote(
                endpoint.to_string(),
                status.as_u16().to_string(),
                if body.trim().is_empty() {
                    format!("HTTP {}", status.as_u16())
                } else {
                    body
                },
                Some(status.as_u16()),
            ),
        }
    }

    /// Parse a 2xx body. An error object without an output is still an error.
    fn parse_success(body: &str, endpoint: &EndpointUrl, status: u16) -> Result<AgentOutput, TransportError> {
        match serde_json::from_str::<WireResponse>(body) {
            Ok(response) => Ok(AgentOutput::from(response)),
            Err(e) => Err(match WireErrorBody::parse(body) {
                Some(error) => TransportError::remote(
                    endpoint.to_string(),
                    error.code_string().unwrap_or_else(|| "remote_error".to_string()),
                    error.message.unwrap_or_default(),
                    Some(status),
                ),
                None => TransportError::remote(
                    endpoint.to_string(),
                    "invalid_response",
                    format!("Malformed response body: {e}"),
                    Some(status),
                ),
            }),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, task), fields(endpoint = %endpoint))]
    async fn invoke(
        &self,
        endpoint: &EndpointUrl,
        task: &Task,
        timeout: Duration,
    ) -> Result<AgentOutput, TransportError> {
        let url = self.url(endpoint, &self.path)?;
        let request_id = Uuid::new_v4().to_string();
        let body = WireRequest::new(task, request_id.clone());

        let request = self.http.post(url).timeout(timeout).json(&body);
        let request = self.authorize(request, endpoint)?;

        debug!(request_id = %request_id, "Invoking remote agent");

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(&e, endpoint, timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::handle_error_response(response, endpoint).await);
        }

        let text = response
            .text()
            .await
            .map_err(|e| Self::map_reqwest_error(&e, endpoint, timeout))?;

        Self::parse_success(&text, endpoint, status.as_u16())
            .map(|output| output.with_served_by(endpoint.to_string()))
    }

    #[instrument(skip(self), fields(endpoint = %endpoint))]
    async fn health_check(
        &self,
        endpoint: &EndpointUrl,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let url = self.url(endpoint, &self.health_path)?;
        let request = self.http.get(url).timeout(timeout);
        let request = match &self.token {
            Some(token) => request.bearer_auth(token.expose_secret()),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| Self::map_reqwest_error(&e, endpoint, timeout))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::handle_error_response(response, endpoint).await)
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Builder for [`HttpTransport`]
#[derive(Debug)]
pub struct HttpTransportBuilder {
    path: String,
    health_path: String,
    token: Option<SecretString>,
    auth_required: bool,
    connect_timeout: Option<Duration>,
    user_agent: String,
    headers: Vec<(String, String)>,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransportBuilder {
    /// Create a new builder
    #[must_use]
    pub fn new() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
            token: None,
            auth_required: false,
            connect_timeout: None,
            user_agent: format!("forge-a2a/{}", env!("CARGO_PKG_VERSION")),
            headers: Vec::new(),
        }
    }

    /// Set the execute path
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the health probe path
    #[must_use]
    pub fn health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// Set the bearer token
    #[must_use]
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(SecretString::new(token.into()));
        self
    }

    /// Set the bearer token from an existing secret
    #[must_use]
    pub fn secret_token(mut self, token: Option<SecretString>) -> Self {
        self.token = token;
        self
    }

    /// Fail calls without a network request when no token is configured
    #[must_use]
    pub fn auth_required(mut self, required: bool) -> Self {
        self.auth_required = required;
        self
    }

    /// Set the connect timeout
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the user agent
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a header sent with every request
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Build the transport
    ///
    /// # Errors
    /// Returns `ProxyError::Configuration` for invalid headers or if the
    /// HTTP client cannot be created
    pub fn build(self) -> Result<HttpTransport, ProxyError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.user_agent)
                .map_err(|e| ProxyError::configuration(format!("Invalid user agent: {e}")))?,
        );

        for (name, value) in &self.headers {
            let header_name = HeaderName::try_from(name.as_str()).map_err(|e| {
                ProxyError::configuration(format!("Invalid header name '{name}': {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                ProxyError::configuration(format!("Invalid header value for '{name}': {e}"))
            })?;
            headers.insert(header_name, header_value);
        }

        if let Some(token) = &self.token {
            HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|_| ProxyError::configuration("Token contains invalid header characters"))?;
        }

        if headers.contains_key(AUTHORIZATION) && self.token.is_some() {
            return Err(ProxyError::configuration(
                "Authorization header conflicts with the configured token",
            ));
        }

        let mut client = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = self.connect_timeout {
            client = client.connect_timeout(timeout);
        }
        let http = client.build().map_err(|e| {
            ProxyError::configuration(format!("Failed to create HTTP client: {e}"))
        })?;

        Ok(HttpTransport {
            http,
            path: self.path,
            health_path: self.health_path,
            token: self.token,
            auth_required: self.auth_required,
        })
    }
}
