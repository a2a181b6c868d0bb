//! # Forge Resilience
//!
//! Resilience helpers for remote agent calls.
//!
//! This crate provides:
//! - A TTL-bounded response cache keyed by task fingerprint
//! - Backoff for repeated attempts on the same endpoint

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backoff;
pub mod cache;

pub use backoff::RetryDelay;
pub use cache::{CacheConfig, CacheStats, ResponseCache};
