//! `deskbridge serve`

use anyhow::{Context, Result};
use clap::Args;
use std::path::Path;
use std::sync::Arc;

use crate::adapters::mcp::{BridgeHttpConfig, BridgeHttpServer};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::LoggerImpl;
use crate::services::BridgeContext;

/// Arguments for `deskbridge serve`.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind to (overrides server.host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides server.port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Heartbeat interval in milliseconds (overrides stream.heartbeat_interval_ms)
    #[arg(long)]
    pub heartbeat_ms: Option<u64>,
}

impl ServeArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(interval) = self.heartbeat_ms {
            config.stream.heartbeat_interval_ms = interval;
        }
    }
}

/// Load configuration, then serve until Ctrl-C.
pub async fn execute(args: ServeArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    args.apply(&mut config);
    ConfigLoader::validate(&config).context("Invalid command-line override")?;

    let _logger = LoggerImpl::init(&config.logging)?;

    let registry = super::build_registry(&config)?;
    tracing::info!(tools = registry.len(), "capability registry ready");

    let context = Arc::new(BridgeContext::new(registry, config.stream.clone()));
    let server = BridgeHttpServer::new(context, BridgeHttpConfig::from(&config.server));

    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
        })
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("Bridge HTTP server failed")
}
