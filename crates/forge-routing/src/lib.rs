//! # Forge Routing
//!
//! Endpoint selection for remote agent calls.
//!
//! This crate provides:
//! - A fixed endpoint pool with per-endpoint health hysteresis
//! - Priority, round-robin and least-connections strategies
//! - Per-call dispatch state with a bounded failover budget
//! - Opportunistic health probing

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod dispatch;
pub mod endpoint;
pub mod health;
pub mod pool;
pub mod strategy;

// Re-export main types
pub use dispatch::{DispatchState, Dispatcher, Selection};
pub use endpoint::{Endpoint, EndpointSnapshot, HealthStatus, HealthThresholds, InFlightGuard};
pub use health::{HealthChecker, ProbeReport};
pub use pool::{EndpointPool, PoolConfig};
pub use strategy::{LoadBalancingStrategy, TieBreak};
