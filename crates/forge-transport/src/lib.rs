//! # Forge Transport
//!
//! Issues single remote-invocation requests against one endpoint.
//!
//! The [`HttpTransport`] implements [`forge_core::Transport`] over HTTP(S)
//! with `reqwest`: a JSON `POST` per task, an optional bearer token, a
//! per-request timeout, and classification of every failure into
//! [`forge_core::TransportError`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod http;
pub mod wire;

pub use http::{HttpTransport, HttpTransportBuilder, DEFAULT_HEALTH_PATH, DEFAULT_PATH};
pub use wire::{WireError, WireErrorBody, WireRequest, WireResponse};
