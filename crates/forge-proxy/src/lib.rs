//! # Forge Proxy
//!
//! [`RemoteAgentProxy`] runs tasks on a remote agent reachable through one or
//! more endpoints. A call:
//!
//! 1. Returns a cached output when the response cache holds one
//! 2. Refreshes endpoint health when probing is enabled
//! 3. Dispatches attempts by the configured strategy, failing over until one
//!    succeeds or the failover budget is spent
//!
//! Authentication failures surface immediately. Every other attempt failure
//! is absorbed until the budget runs out, then reported once as
//! `ProxyError::Exhausted` with the full attempt history.
//!
//! ```rust,no_run
//! use forge_config::RemoteAgentConfig;
//! use forge_core::Task;
//! use forge_proxy::RemoteAgentProxy;
//!
//! # async fn example() -> Result<(), forge_core::ProxyError> {
//! let proxy = RemoteAgentProxy::builder("researcher")
//!     .config(
//!         RemoteAgentConfig::new("http://research-1:8080")
//!             .with_failover_servers(["http://research-2:8080"]),
//!     )
//!     .build()?;
//!
//! let output = proxy.run(Task::new("Find recent papers on RAFT")).await?;
//! println!("{}", output.content());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod proxy;
pub mod state;

pub use builder::{FingerprintFn, RemoteAgentProxyBuilder};
pub use proxy::{ProxySnapshot, RemoteAgentProxy};
pub use state::CallState;
