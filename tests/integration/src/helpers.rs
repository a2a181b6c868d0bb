//! Test helper utilities for integration tests

use forge_config::RemoteAgentConfig;
use forge_core::{ChannelEventEmitter, ProxyEvent};
use forge_proxy::RemoteAgentProxy;
use once_cell::sync::Lazy;
use std::net::TcpListener;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Initialize tracing for tests (only once)
static TRACING: Lazy<()> = Lazy::new(|| {
    if std::env::var("TEST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
});

/// Initialize tracing for tests
pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// URL of a local port with nothing listening on it
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind");
    let addr = listener.local_addr().expect("Failed to get local addr");
    drop(listener);
    format!("http://{addr}")
}

/// A proxy wired to an event channel
pub struct TestProxy {
    /// The proxy under test
    pub proxy: RemoteAgentProxy,
    /// Subscription taken before any call
    pub events: broadcast::Receiver<ProxyEvent>,
}

impl TestProxy {
    /// Build a proxy over HTTP for `config`
    pub fn new(name: &str, config: RemoteAgentConfig) -> Self {
        init_tracing();
        let emitter = Arc::new(ChannelEventEmitter::new(64));
        let events = emitter.subscribe();
        let proxy = RemoteAgentProxy::builder(name)
            .config(config)
            .emitter(emitter)
            .build()
            .expect("Failed to build proxy");
        Self { proxy, events }
    }

    /// Every event emitted so far
    pub fn drain_events(&mut self) -> Vec<ProxyEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Event type names emitted so far
    pub fn event_types(&mut self) -> Vec<&'static str> {
        self.drain_events()
            .iter()
            .map(ProxyEvent::event_type)
            .collect()
    }
}
