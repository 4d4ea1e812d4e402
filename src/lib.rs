//! Deskbridge - desktop automation tool bridge
//!
//! Deskbridge exposes a fixed set of desktop automation tools over HTTP.
//! Clients discover the tools, submit `tools/call` requests, and receive
//! each result (or error) asynchronously on a server-sent event stream,
//! correlated by the id they supplied.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): tool descriptors, invocations, the queue, and provider ports
//! - **Service Layer** (`services`): registry, manifest, dispatch, and error translation
//! - **Adapters** (`adapters`): HTTP surface and capability providers
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use deskbridge::adapters::mcp::{BridgeHttpConfig, BridgeHttpServer};
//! use deskbridge::cli::commands::build_registry;
//! use deskbridge::services::BridgeContext;
//! use deskbridge::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let registry = build_registry(&config)?;
//!     let context = Arc::new(BridgeContext::new(registry, config.stream.clone()));
//!     BridgeHttpServer::new(context, BridgeHttpConfig::from(&config.server))
//!         .serve()
//!         .await
//!         .map_err(|e| anyhow::anyhow!(e))
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    Config, CorrelationId, InvocationEvent, InvocationQueue, InvocationRequest, ToolDescriptor,
};
pub use domain::{DesktopError, ToolError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{BridgeContext, CapabilityRegistry, Dispatcher, ManifestPublisher};
