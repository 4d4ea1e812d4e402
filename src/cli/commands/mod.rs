//! CLI command implementations.

pub mod serve;
pub mod tools;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::adapters::desktop::{HostProcesses, VirtualDesktop};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;
use crate::services::{builtin_registry, CapabilityRegistry, Providers};

/// Load configuration, honoring an explicit `--config` file.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    ConfigLoader::load_with(path)
}

/// Registry of built-in tools over the configured providers.
pub fn build_registry(config: &Config) -> Result<CapabilityRegistry> {
    let providers = Providers {
        desktop: Arc::new(VirtualDesktop::new(&config.display)),
        processes: Arc::new(HostProcesses::new()),
        screenshot_path: config.capture.screenshot_path.clone(),
    };
    builtin_registry(providers).context("Failed to register built-in tools")
}
