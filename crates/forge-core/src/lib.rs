//! # Forge Core
//!
//! Core types, traits, and error handling for the Agent Forge A2A client.
//!
//! This crate provides the foundational types shared by every other crate:
//! - Task, output and fingerprint types
//! - Validated endpoint URLs
//! - Attempt records and outcomes
//! - The transport and proxy error taxonomy
//! - Proxy lifecycle events and the emitter trait
//! - The `Agent` execution contract and the `Transport` seam

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod attempt;
pub mod error;
pub mod events;
pub mod transport;
pub mod types;

// Re-export commonly used types
pub use agent::Agent;
pub use attempt::{AttemptOutcome, AttemptRecord};
pub use error::{ProxyError, ProxyResult, TransportError};
pub use events::{
    ChannelEventEmitter, CompositeEventEmitter, EventEmitter, NoOpEventEmitter, ProxyEvent,
};
pub use transport::Transport;
pub use types::{AgentOutput, CallId, EndpointUrl, Fingerprint, Task};
