//! # Forge Telemetry
//!
//! Observability for remote agent calls.
//!
//! This crate provides:
//! - Subscriber setup with `EnvFilter`, pretty/compact/JSON output and an
//!   optional OpenTelemetry layer
//! - An event emitter that logs proxy events
//! - An event emitter that records Prometheus metrics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod emitter;
pub mod metrics;
pub mod tracing_setup;

pub use emitter::TracingEventEmitter;
pub use metrics::{MetricsError, MetricsEventEmitter};
pub use tracing_setup::{init_tracing, shutdown_tracing, LogFormat, TracingConfig, TracingError};
