//! Proxy lifecycle events and emitters.
//!
//! The proxy reports what it does through [`EventEmitter`] so observers
//! (logging, metrics, test probes) can subscribe without the core depending
//! on any of them.

use crate::attempt::{AttemptOutcome, AttemptRecord};
use crate::types::CallId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Event emitted by a remote agent proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProxyEvent {
    /// An attempt against an endpoint is about to start
    AttemptStarted {
        /// Agent name
        agent: String,
        /// Call correlation ID
        call_id: CallId,
        /// Endpoint URL
        endpoint: String,
        /// 1-based attempt number within the call
        attempt: u32,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },
    /// An attempt failed
    AttemptFailed {
        /// Agent name
        agent: String,
        /// Call correlation ID
        call_id: CallId,
        /// Endpoint URL
        endpoint: String,
        /// 1-based attempt number within the call
        attempt: u32,
        /// Failure outcome
        outcome: AttemptOutcome,
        /// Attempt duration in milliseconds
        duration_ms: u64,
        /// Whether the proxy will fail over to another attempt
        will_failover: bool,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },
    /// The call produced an output
    CallSucceeded {
        /// Agent name
        agent: String,
        /// Call correlation ID
        call_id: CallId,
        /// Endpoint that served the output
        endpoint: String,
        /// Number of attempts made
        attempts: u32,
        /// Attempt duration in milliseconds of the successful attempt
        duration_ms: u64,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },
    /// The call was answered from the response cache
    CacheHit {
        /// Agent name
        agent: String,
        /// Call correlation ID
        call_id: CallId,
        /// Task fingerprint
        fingerprint: String,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },
    /// Every permitted attempt failed
    CallExhausted {
        /// Agent name
        agent: String,
        /// Call correlation ID
        call_id: CallId,
        /// Every attempt made
        attempts: Vec<AttemptRecord>,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },
    /// The call failed without exhausting its budget (auth or cancellation)
    CallFailed {
        /// Agent name
        agent: String,
        /// Call correlation ID
        call_id: CallId,
        /// Error code
        error_code: String,
        /// Error message
        message: String,
        /// Timestamp
        timestamp: DateTime<Utc>,
    },
}

impl ProxyEvent {
    /// Get the event type as a string
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AttemptStarted { .. } => "attempt_started",
            Self::AttemptFailed { .. } => "attempt_failed",
            Self::CallSucceeded { .. } => "call_succeeded",
            Self::CacheHit { .. } => "cache_hit",
            Self::CallExhausted { .. } => "call_exhausted",
            Self::CallFailed { .. } => "call_failed",
        }
    }

    /// Get the call this event belongs to
    #[must_use]
    pub fn call_id(&self) -> CallId {
        match self {
            Self::AttemptStarted { call_id, .. }
            | Self::AttemptFailed { call_id, .. }
            | Self::CallSucceeded { call_id, .. }
            | Self::CacheHit { call_id, .. }
            | Self::CallExhausted { call_id, .. }
            | Self::CallFailed { call_id, .. } => *call_id,
        }
    }

    /// Get the timestamp
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::AttemptStarted { timestamp, .. }
            | Self::AttemptFailed { timestamp, .. }
            | Self::CallSucceeded { timestamp, .. }
            | Self::CacheHit { timestamp, .. }
            | Self::CallExhausted { timestamp, .. }
            | Self::CallFailed { timestamp, .. } => *timestamp,
        }
    }
}

/// Sink for proxy events
#[async_trait::async_trait]
pub trait EventEmitter: Send + Sync + std::fmt::Debug {
    /// Emit an event
    async fn emit(&self, event: ProxyEvent);

    /// Flush any buffered events
    async fn flush(&self) {}
}

/// Emitter that drops every event
#[derive(Debug, Clone, Default)]
pub struct NoOpEventEmitter;

#[async_trait::async_trait]
impl EventEmitter for NoOpEventEmitter {
    async fn emit(&self, _event: ProxyEvent) {}
}

/// Emitter that forwards to several emitters in order
#[derive(Debug, Default)]
pub struct CompositeEventEmitter {
    emitters: Vec<Arc<dyn EventEmitter>>,
}

impl CompositeEventEmitter {
    /// Create a new composite emitter
    #[must_use]
    pub fn new(emitters: Vec<Arc<dyn EventEmitter>>) -> Self {
        Self { emitters }
    }

    /// Add an emitter
    pub fn add(&mut self, emitter: Arc<dyn EventEmitter>) {
        self.emitters.push(emitter);
    }

    /// Number of wrapped emitters
    #[must_use]
    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    /// Check if no emitters are wrapped
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }
}

#[async_trait::async_trait]
impl EventEmitter for CompositeEventEmitter {
    async fn emit(&self, event: ProxyEvent) {
        for emitter in &self.emitters {
            emitter.emit(event.clone()).await;
        }
    }

    async fn flush(&self) {
        for emitter in &self.emitters {
            emitter.flush().await;
        }
    }
}

/// Emitter that publishes events on a broadcast channel.
///
/// Subscribers that fall behind lose the oldest events; emitting never blocks.
#[derive(Debug, Clone)]
pub struct ChannelEventEmitter {
    sender: broadcast::Sender<ProxyEvent>,
}

impl ChannelEventEmitter {
    /// Create an emitter buffering up to `capacity` events per subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProxyEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait::async_trait]
impl EventEmitter for ChannelEventEmitter {
    async fn emit(&self, event: ProxyEvent) {
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }
}
